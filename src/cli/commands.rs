//! CLI command implementations

use anyhow::{bail, Context as _, Result};
use serde_json::{Map, Value};
use std::io::Read;
use std::path::Path;

use cypher_translate::schema::{create_default_schema, load_schema, validate_schema, Severity};
use cypher_translate::translate::{
    ConnectArgs, ConnectBuilder, Context, Params, Quoting, ResolveTree, WhereCompiler,
};

/// Flags of `cyt where`
pub struct WhereOptions<'a> {
    pub node: &'a str,
    pub var: &'a str,
    pub resolve_tree: Option<&'a Path>,
    pub jwt: Option<&'a Path>,
    pub context: Option<&'a Path>,
    pub max_depth: Option<usize>,
}

/// Flags of `cyt connect`
pub struct ConnectOptions<'a> {
    pub node: &'a str,
    pub field: &'a str,
    pub parent_var: &'a str,
    pub var: &'a str,
    pub jwt: Option<&'a Path>,
    pub context: Option<&'a Path>,
    pub from_create: bool,
    pub escaped: bool,
    pub max_depth: Option<usize>,
}

/// Write an example schema
pub fn init(path: &Path) -> Result<()> {
    println!("Initializing schema at: {}", path.display());

    std::fs::create_dir_all(path)
        .with_context(|| format!("Failed to create directory: {}", path.display()))?;

    create_default_schema(path)?;

    println!("✓ Created schema.yaml");
    println!("\nTry: cyt --schema {} check", path.join("schema.yaml").display());

    Ok(())
}

/// Validate the schema (check for errors)
pub fn check(schema_path: &Path, strict: bool) -> Result<()> {
    println!("Checking schema: {}", schema_path.display());

    let schema = load_schema(schema_path)?;
    let findings = validate_schema(&schema);

    let mut errors = 0;
    let mut warnings = 0;

    for finding in &findings {
        match finding.severity {
            Severity::Error => {
                println!("ERROR: {}", finding);
                errors += 1;
            }
            Severity::Warning => {
                println!("WARN:  {}", finding);
                warnings += 1;
            }
        }
    }

    println!();
    if findings.is_empty() {
        println!(
            "✓ No issues found in {} nodes, {} relationships.",
            schema.nodes().len(),
            schema.relationships().len()
        );
    } else {
        println!("Found {} error(s), {} warning(s).", errors, warnings);
    }

    if errors > 0 || (strict && warnings > 0) {
        std::process::exit(1);
    }

    Ok(())
}

/// Compile a filter input and print the clause and its parameters
pub fn where_clause(schema_path: &Path, opts: &WhereOptions<'_>, input: &Path) -> Result<()> {
    let schema = load_schema(schema_path)?;
    let node = schema
        .node(opts.node)
        .with_context(|| format!("Unknown node '{}'", opts.node))?;

    let mut ctx = Context::new(&schema);
    if let Some(path) = opts.resolve_tree {
        let tree: ResolveTree = serde_json::from_value(read_json(path)?)
            .with_context(|| format!("Invalid resolve tree: {}", path.display()))?;
        ctx = ctx.with_resolve_tree(tree);
    }
    if let Some(path) = opts.jwt {
        ctx = ctx.with_jwt(read_object(path)?);
    }
    if let Some(path) = opts.context {
        ctx = ctx.with_values(read_object(path)?);
    }
    if let Some(max_depth) = opts.max_depth {
        ctx = ctx.with_max_depth(max_depth);
    }

    let filter = read_object(input)?;
    let (clause, params) = WhereCompiler::new(&ctx)
        .compile(&filter, opts.var, node, None, false)
        .context("Failed to compile filter")?;

    print_output(&clause, &params)
}

/// Compile a connect input and print the statements and their parameters
pub fn connect(schema_path: &Path, opts: &ConnectOptions<'_>, input: &Path) -> Result<()> {
    let schema = load_schema(schema_path)?;
    let parent = schema
        .node(opts.node)
        .with_context(|| format!("Unknown node '{}'", opts.node))?;
    let field = parent
        .relation_field(opts.field)
        .with_context(|| format!("Unknown relationship field '{}.{}'", opts.node, opts.field))?;

    let mut ctx = Context::new(&schema);
    if let Some(path) = opts.jwt {
        ctx = ctx.with_jwt(read_object(path)?);
    }
    if let Some(path) = opts.context {
        ctx = ctx.with_values(read_object(path)?);
    }
    if let Some(max_depth) = opts.max_depth {
        ctx = ctx.with_max_depth(max_depth);
    }

    let value = read_json(input)?;
    let quoting = if opts.escaped { Quoting::Escaped } else { Quoting::Plain };
    let with_vars = vec![opts.parent_var.to_string()];

    // Union fields take one input per member type: { Actor: [...], Genre: [...] }
    let targets: Vec<(&str, Option<&str>, &Value)> = match &field.union {
        Some(members) => {
            let Some(by_member) = value.as_object() else {
                bail!("Connect input for union field '{}' must be keyed by member type", field.name);
            };
            by_member
                .iter()
                .map(|(member, v)| {
                    if !members.contains(member) {
                        bail!("'{}' is not a member of union field '{}'", member, field.name);
                    }
                    Ok((member.as_str(), Some(member.as_str()), v))
                })
                .collect::<Result<_>>()?
        }
        None => vec![(field.target.as_str(), None, &value)],
    };

    let builder = ConnectBuilder::new(&ctx);
    let mut lines = Vec::new();
    let mut params = Params::new();

    for (target, label_override, value) in targets {
        let ref_node = schema
            .node(target)
            .with_context(|| format!("Unknown node '{}'", target))?;
        let var_name = match label_override {
            Some(member) => format!("{}_{}", opts.var, member),
            None => opts.var.to_string(),
        };

        let args = ConnectArgs {
            var_name: &var_name,
            relation_field: field,
            parent_var: opts.parent_var,
            ref_node,
            parent_node: parent,
            with_vars: &with_vars,
            label_override,
            from_create: opts.from_create,
            quoting,
        };

        let (text, compiled) = builder
            .compile(value, &args)
            .context("Failed to compile connect input")?;
        lines.push(text);
        params.extend(compiled);
    }

    print_output(&lines.join("\n"), &params)
}

fn print_output(clause: &str, params: &Params) -> Result<()> {
    println!("{}", clause);
    println!();
    println!("{}", serde_json::to_string_pretty(params)?);
    Ok(())
}

fn read_json(path: &Path) -> Result<Value> {
    let contents = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read stdin")?;
        buf
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read input: {}", path.display()))?
    };

    serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse JSON: {}", path.display()))
}

fn read_object(path: &Path) -> Result<Map<String, Value>> {
    match read_json(path)? {
        Value::Object(map) => Ok(map),
        _ => bail!("Expected a JSON object in {}", path.display()),
    }
}
