//! symdiff - evaluate, type-check and differentiate integer expressions
//!
//! Expressions are passed as JSON trees (the serde form of `symdiff_core::Expr`),
//! either inline or as `@path` to a file.

use anyhow::{bail, Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use env_logger::Env;
use log::{debug, info};
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use symdiff_core::{
    derive, CompileEnvironment, Derivative, ExecutionEnvironment, Expr, Gradient, LikeTerms,
    OverflowPolicy, Simplifier, SimplifyOptions, Type, Value,
};

mod config;

use config::{ConfigLoader, LogLevel, OutputFormat, SymdiffConfig};

#[derive(Parser)]
#[command(
    name = "symdiff",
    version = env!("CARGO_PKG_VERSION"),
    about = "Symbolic differentiation and simplification of integer expressions",
    long_about = r#"
symdiff evaluates, type-checks, simplifies and symbolically differentiates
expressions over 32-bit integers.

Expressions are JSON trees, for example x * x + 3 is written

  {"Add":[{"Multiply":[{"Variable":"x"},{"Variable":"x"}]},{"Constant":3}]}

Examples:
  symdiff derive --expr @f.json --var x          # simplified derivative
  symdiff derive --expr @f.json --var x --raw    # raw product-rule output
  symdiff eval --expr @f.json --bind x=2         # evaluate at x = 2
  symdiff gradient --expr @f.json --var x --var y --bind x=1 --bind y=2
  symdiff demo                                   # worked examples
"#,
    after_help = r#"
Environment Variables:
  SYMDIFF_CONFIG=<path>        Path to configuration file
  SYMDIFF_OVERFLOW=checked     Constant folding overflow (checked, wrapping, saturating)
  SYMDIFF_LIKE_TERMS=pairwise  Like-term combination (pairwise, extended)
  SYMDIFF_LOG_LEVEL=warn       Set log level (error, warn, info, debug, trace)
  SYMDIFF_DEBUG=1              Enable debug logging
  SYMDIFF_OUTPUT=text          Output format (text, json)
"#
)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Set log level
    #[arg(long, value_enum)]
    log_level: Option<LogLevel>,

    /// Configuration file
    #[arg(long, env = "SYMDIFF_CONFIG")]
    config: Option<PathBuf>,

    /// Constant folding on overflow: checked, wrapping, saturating
    #[arg(long, value_parser = parse_overflow_arg)]
    overflow: Option<OverflowPolicy>,

    /// Like-term combination: pairwise, extended
    #[arg(long, value_parser = parse_like_terms_arg)]
    like_terms: Option<LikeTerms>,

    /// Output format
    #[arg(long, value_enum)]
    output: Option<OutputFormat>,

    /// Print a sample configuration file and exit
    #[arg(long)]
    generate_config: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Clone)]
enum Commands {
    /// Differentiate an expression
    Derive {
        /// Expression as JSON, or @path to a JSON file
        #[arg(short, long)]
        expr: String,

        /// Derivation variable
        #[arg(short, long, default_value = "x")]
        var: String,

        /// Skip simplification
        #[arg(long)]
        raw: bool,

        /// Derivative order
        #[arg(long, default_value = "1")]
        order: u32,
    },
    /// Simplify an expression
    Simplify {
        #[arg(short, long)]
        expr: String,
    },
    /// Evaluate an expression
    Eval {
        #[arg(short, long)]
        expr: String,

        /// Variable binding NAME=INT (repeatable)
        #[arg(short, long = "bind", value_name = "NAME=INT")]
        bindings: Vec<String>,
    },
    /// Best-effort reduction to normal form
    Reduce {
        #[arg(short, long)]
        expr: String,

        #[arg(short, long = "bind", value_name = "NAME=INT")]
        bindings: Vec<String>,
    },
    /// Type-check an expression and report its inferred type
    Check {
        #[arg(short, long)]
        expr: String,

        /// Variable declaration NAME=TYPE (int, bool, string, vector, fn)
        #[arg(long = "declare", value_name = "NAME=TYPE")]
        declarations: Vec<String>,
    },
    /// Partial derivatives with respect to several variables
    Gradient {
        #[arg(short, long)]
        expr: String,

        /// Variables, in order (repeatable)
        #[arg(short, long = "var", required = true)]
        vars: Vec<String>,

        /// Evaluate the partials at NAME=INT (repeatable)
        #[arg(short, long = "bind", value_name = "NAME=INT")]
        bindings: Vec<String>,
    },
    /// Run the worked examples
    Demo,
}

/// Result of one command, rendered as text or JSON
#[derive(Serialize)]
#[serde(rename_all = "snake_case")]
enum Output {
    Expr(Expr),
    Value(Value),
    Exprs(Vec<Expr>),
    TypeCheck { well_typed: bool, inferred: Type },
}

impl Output {
    fn display(&self) -> String {
        match self {
            Output::Expr(e) => e.to_string(),
            Output::Value(v) => v.to_string(),
            Output::Exprs(es) => {
                let parts: Vec<String> = es.iter().map(|e| e.to_string()).collect();
                format!("[{}]", parts.join(", "))
            }
            Output::TypeCheck {
                well_typed,
                inferred,
            } => {
                let verdict = if *well_typed { "well typed" } else { "ill typed" };
                format!("{verdict}: {inferred}")
            }
        }
    }
}

fn parse_overflow_arg(s: &str) -> Result<OverflowPolicy, String> {
    config::parse_overflow_policy(s).ok_or_else(|| {
        format!("Invalid overflow policy '{s}'. Expected: checked, wrapping, saturating")
    })
}

fn parse_like_terms_arg(s: &str) -> Result<LikeTerms, String> {
    config::parse_like_terms(s)
        .ok_or_else(|| format!("Invalid like-terms mode '{s}'. Expected: pairwise, extended"))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.generate_config {
        println!("{}", ConfigLoader::generate_sample_config());
        return Ok(());
    }

    let mut config = load_configuration(&cli)?;
    apply_cli_overrides(&mut config, &cli);

    let log_level = if config.logging.debug {
        log::LevelFilter::Debug
    } else {
        config.logging.level.into()
    };

    env_logger::Builder::from_env(Env::default().default_filter_or("warn"))
        .filter_level(log_level)
        .format(format_log_record)
        .init();

    info!("symdiff v{} starting", env!("CARGO_PKG_VERSION"));
    debug!("Configuration loaded: {config:?}");

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    let options = config.simplify.to_options();
    let format = config.output.format;

    match command {
        Commands::Derive {
            expr,
            var,
            raw,
            order,
        } => {
            let input = parse_expr_arg(&expr, options)?;
            let result = execute_derive(&input, &var, raw, order, options)?;
            emit(format, &input, &Output::Expr(result))
        }
        Commands::Simplify { expr } => {
            let input = parse_expr_arg(&expr, options)?;
            let (result, report) = Simplifier::new(options).simplify_with_report(&input);
            info!(
                "simplified {} -> {} nodes",
                report.initial_size, report.final_size
            );
            emit(format, &input, &Output::Expr(result))
        }
        Commands::Eval { expr, bindings } => {
            let input = parse_expr_arg(&expr, options)?;
            let env = execution_environment(&bindings)?;
            let value = input
                .evaluate(&env)
                .with_context(|| format!("Failed to evaluate {input}"))?;
            emit(format, &input, &Output::Value(value))
        }
        Commands::Reduce { expr, bindings } => {
            let input = parse_expr_arg(&expr, options)?;
            let env = execution_environment(&bindings)?;
            let reduced = input.reduce_to_normal_form(&env)?;
            emit(format, &input, &Output::Expr(reduced))
        }
        Commands::Check { expr, declarations } => {
            let input = parse_expr_arg(&expr, options)?;
            let mut env = compile_environment(&declarations)?;
            let well_typed = input.type_check(&mut env)?;
            let inferred = input.infer_type(&mut env)?;
            emit(
                format,
                &input,
                &Output::TypeCheck {
                    well_typed,
                    inferred,
                },
            )
        }
        Commands::Gradient {
            expr,
            vars,
            bindings,
        } => {
            let input = parse_expr_arg(&expr, options)?;
            let gradient = Gradient::new(input.clone(), vars).with_options(options);
            let output = if bindings.is_empty() {
                Output::Exprs(gradient.symbolic()?)
            } else {
                let env = execution_environment(&bindings)?;
                Output::Value(gradient.evaluate(&env)?)
            };
            emit(format, &Expr::Gradient(gradient), &output)
        }
        Commands::Demo => run_demo(format, options),
    }
}

/// Load configuration from files and environment
fn load_configuration(cli: &Cli) -> Result<SymdiffConfig> {
    let config_from_env = std::env::var("SYMDIFF_CONFIG").ok().map(PathBuf::from);

    if let Some(config_file) = &cli.config {
        // A path that only came from the environment is allowed to be missing
        let is_from_env = config_from_env.as_ref() == Some(config_file);

        if config_file.is_file() {
            info!("Loading configuration from: {}", config_file.display());
            return ConfigLoader::load_from_file(config_file);
        }
        if !config_file.exists() && !is_from_env {
            bail!(
                "Specified config file does not exist: {}",
                config_file.display()
            );
        }
    }

    ConfigLoader::load()
}

/// Apply CLI argument overrides to configuration
fn apply_cli_overrides(config: &mut SymdiffConfig, cli: &Cli) {
    if cli.debug {
        config.logging.debug = true;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    if let Some(overflow) = cli.overflow {
        config.simplify.overflow = overflow;
    }
    if let Some(like_terms) = cli.like_terms {
        config.simplify.like_terms = like_terms;
    }
    if let Some(format) = cli.output {
        config.output.format = format;
    }
}

/// Inline JSON, or `@path` to a JSON file. Derivative and gradient nodes
/// that carry no options of their own get the configured ones.
fn parse_expr_arg(arg: &str, options: SimplifyOptions) -> Result<Expr> {
    let (source, content) = match arg.strip_prefix('@') {
        Some(path) => (
            path.to_string(),
            std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read expression file: {path}"))?,
        ),
        None => ("<inline>".to_string(), arg.to_string()),
    };
    let expr: Expr = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse expression JSON from {source}"))?;
    Ok(expr.with_default_options(options))
}

fn split_assignment<'a>(arg: &'a str, what: &str) -> Result<(&'a str, &'a str)> {
    match arg.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => Ok((name.trim(), value.trim())),
        _ => bail!("Invalid {what} '{arg}', expected NAME=VALUE"),
    }
}

fn execution_environment(bindings: &[String]) -> Result<ExecutionEnvironment> {
    let mut env = ExecutionEnvironment::new();
    for binding in bindings {
        let (name, value) = split_assignment(binding, "binding")?;
        let value: i32 = value
            .parse()
            .with_context(|| format!("Binding '{binding}' is not a 32-bit integer"))?;
        env.declare(name, Value::Int(value))?;
    }
    Ok(env)
}

fn compile_environment(declarations: &[String]) -> Result<CompileEnvironment> {
    let mut env = CompileEnvironment::new();
    for declaration in declarations {
        let (name, ty) = split_assignment(declaration, "declaration")?;
        let ty = match ty.to_ascii_lowercase().as_str() {
            "int" => Type::Int,
            "bool" => Type::Bool,
            "string" => Type::String,
            "vector" => Type::Vector,
            "fn" | "function" => Type::int_to_int(),
            other => bail!("Unknown type '{other}' in declaration '{declaration}'"),
        };
        env.declare(name, ty)?;
    }
    Ok(env)
}

fn execute_derive(
    input: &Expr,
    var: &str,
    raw: bool,
    order: u32,
    options: SimplifyOptions,
) -> Result<Expr> {
    let result = if raw {
        (0..order).try_fold(input.clone(), |e, _| derive(&e, var))?
    } else {
        Simplifier::new(options).derive_nth(input, var, order)?
    };
    Ok(result)
}

fn emit(format: OutputFormat, input: &Expr, output: &Output) -> Result<()> {
    match format {
        OutputFormat::Text => println!("{input} => {}", output.display()),
        OutputFormat::Json => {
            let doc = serde_json::json!({
                "input": input,
                "input_display": input.to_string(),
                "output": output,
                "display": output.display(),
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&doc).context("Failed to serialize output")?
            );
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct DemoLine {
    label: String,
    result: String,
}

fn run_demo(format: OutputFormat, options: SimplifyOptions) -> Result<()> {
    let x = || Expr::var("x");
    let c = Expr::constant;
    let simplifier = Simplifier::new(options);
    let mut lines = Vec::new();

    // 2*x*x + x + 1
    let polynomial = Expr::add(
        Expr::add(Expr::mul(c(2), Expr::mul(x(), x())), x()),
        c(1),
    );
    let raw = derive(&polynomial, "x")?;
    lines.push(DemoLine {
        label: format!("d/dx {polynomial} (raw)"),
        result: raw.to_string(),
    });
    lines.push(DemoLine {
        label: format!("d/dx {polynomial}"),
        result: simplifier.simplify(&raw).to_string(),
    });

    // x*x + 3 at x = 2
    let square = Expr::add(Expr::mul(x(), x()), c(3));
    let mut env = ExecutionEnvironment::new();
    env.declare("x", Value::Int(2))?;
    let node = Derivative::new(square.clone(), "x").with_options(options);
    lines.push(DemoLine {
        label: format!("{} at x = 2", Expr::Derivative(node.clone())),
        result: node.evaluate(&env)?.to_string(),
    });
    let gradient = Gradient::new(square, ["x"]).with_options(options);
    lines.push(DemoLine {
        label: format!("{} at x = 2", Expr::Gradient(gradient.clone())),
        result: gradient.evaluate(&env)?.to_string(),
    });

    // x*x + x*x + 3
    let doubled = Expr::add(
        Expr::add(Expr::mul(x(), x()), Expr::mul(x(), x())),
        c(3),
    );
    lines.push(DemoLine {
        label: format!("d/dx {doubled}"),
        result: simplifier.simplify(&derive(&doubled, "x")?).to_string(),
    });

    match format {
        OutputFormat::Text => {
            for line in &lines {
                println!("{} = {}", line.label, line.result);
            }
        }
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&lines).context("Failed to serialize demo output")?
        ),
    }
    Ok(())
}

fn format_log_record(
    buf: &mut env_logger::fmt::Formatter,
    record: &log::Record,
) -> std::io::Result<()> {
    let timestamp = buf.timestamp_millis();
    writeln!(
        buf,
        "[{} {:>5} {}] {}",
        timestamp,
        record.level(),
        record.target(),
        record.args()
    )
}
