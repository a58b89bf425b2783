use std::process;

use rowcache::{
    application::error::AppError,
    cache::{CacheConfig, ConfigRegistry, KeyCodec},
    config::{self, KeyArgs, Settings},
    domain::{Attributes, DomainError, Value},
    infra::telemetry,
};
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

fn main() {
    if let Err(error) = run() {
        report_application_error(&error);
        process::exit(error.exit_code());
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt()
        .with_max_level(Level::ERROR)
        .with_writer(std::io::stderr)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    telemetry::init(&settings.logging)?;
    let registry = config::build_registry(&settings)?;
    info!(models = registry.len(), "Loaded cache configuration");

    match cli_args.command {
        config::Command::Validate => run_validate(&registry),
        config::Command::Key(args) => run_key(&settings, &registry, &args),
    }
}

fn run_validate(registry: &ConfigRegistry) -> Result<(), AppError> {
    for name in registry.type_names() {
        let config = registry.get(&name)?;
        println!("{}", describe(&config));
    }
    Ok(())
}

fn run_key(settings: &Settings, registry: &ConfigRegistry, args: &KeyArgs) -> Result<(), AppError> {
    let config = registry.get(&args.model)?;
    let record_type = config.record_type();

    let mut attrs = Attributes::new();
    for (name, raw) in &args.values {
        let column = record_type
            .column(&rowcache::domain::normalize_column(name))
            .ok_or_else(|| DomainError::unknown_attribute(record_type.name(), name))?;
        let value = Value::parse_as(column.name(), column.column_type(), raw)?;
        attrs.insert(column.name(), value);
    }

    let codec = KeyCodec::try_from(&settings.cache)?;
    let key = codec.lookup_key(&config, &attrs, args.counter.as_deref())?;
    println!("{key}");
    Ok(())
}

fn describe(config: &CacheConfig) -> String {
    let indexes: Vec<String> = config.indexes().iter().map(ToString::to_string).collect();
    let ttl = match config.expires_in() {
        Some(ttl) => format!("{}s", ttl.as_secs()),
        None => "none".to_string(),
    };
    format!(
        "{}: indexes {} counters [{}] ttl {}",
        config.type_name(),
        indexes.join(" "),
        config.counters().join(", "),
        ttl
    )
}
