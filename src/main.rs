use std::process;

use pubcache::{
    cache::CacheConfig,
    config::{self, Command, KeyQuery, LogFormat, Settings},
    infra::{error::InfraError, telemetry},
    published::PublishedKey,
};
use tracing::{Dispatch, Level, debug, dispatcher, error};
use tracing_subscriber::fmt as tracing_fmt;

fn main() {
    if let Err(error) = run() {
        report_error(&error);
        process::exit(1);
    }
}

fn report_error(error: &InfraError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "pubcache failed");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "pubcache failed");
    });
}

fn run() -> Result<(), InfraError> {
    let (args, settings) = config::load_with_cli()?;
    telemetry::init(&settings.logging)?;

    let command = args.command.unwrap_or(Command::Settings);
    debug!(?command, "Running command");

    match command {
        Command::Settings => print_settings(&settings),
        Command::Policies => print_policies(&CacheConfig::from(&settings.cache)),
        Command::Keys(keys) => println!("{}", published_key(&keys.query)),
    }
    Ok(())
}

fn print_settings(settings: &Settings) {
    let format = match settings.logging.format {
        LogFormat::Json => "json",
        LogFormat::Compact => "compact",
    };
    let cache = &settings.cache;

    println!("logging.level = {}", settings.logging.level);
    println!("logging.format = {format}");
    println!("cache.entity_ttl_seconds = {}", cache.entity_ttl.as_secs());
    println!("cache.full_data_set_expires = {}", cache.full_data_set_expires);
    println!(
        "cache.published_ttl_seconds = {}",
        cache.published_ttl.as_secs()
    );
    println!(
        "cache.get_all_validate_count = {}",
        cache.get_all_validate_count
    );
    println!(
        "cache.get_all_allow_zero_count = {}",
        cache.get_all_allow_zero_count
    );
    for (kind, policy) in &cache.policies {
        println!("cache.policies.{kind} = {policy}");
    }
}

fn print_policies(config: &CacheConfig) {
    for (kind, policy) in config.policy_registry().entries() {
        println!("{kind:<22} {policy}");
    }
}

fn published_key(query: &KeyQuery) -> PublishedKey {
    match query.clone() {
        KeyQuery::ContentAtRoot { preview, culture } => {
            PublishedKey::ContentKeysAtRoot { preview, culture }
        }
        KeyQuery::ContentByType { preview, alias } => {
            PublishedKey::ContentKeysByContentType { preview, alias }
        }
        KeyQuery::ContentById { preview, id } => PublishedKey::ContentKeyById { preview, id },
        KeyQuery::MediaById { id } => PublishedKey::MediaKeyById { id },
        KeyQuery::MemberById { id } => PublishedKey::MemberKeyById { id },
        KeyQuery::Domains { include_wildcards } => {
            PublishedKey::AllDomainIds { include_wildcards }
        }
        KeyQuery::AssignedDomains {
            document_id,
            include_wildcards,
        } => PublishedKey::AssignedDomainIds {
            document_id,
            include_wildcards,
        },
    }
}
