mod commandline;
mod defaults;
mod file;
mod primitives;

use clap::Parser;

pub(crate) use file::{ConfigFile as Configuration, Media, Metrics, ObjectStorage, Repo, Tracing};
pub(crate) use primitives::LogFormat;

use commandline::Args;

pub(crate) fn configure() -> color_eyre::Result<Configuration> {
    let Args {
        config_file,
        address,
        log_format,
    } = Args::parse();

    let mut builder = config::Config::builder()
        .add_source(config::Config::try_from(&defaults::Defaults::default())?);

    if let Some(config_file) = config_file {
        builder = builder.add_source(config::File::from(config_file));
    }

    let mut configuration: Configuration = builder
        .add_source(config::Environment::with_prefix("VIDRS").separator("__"))
        .build()?
        .try_deserialize()?;

    if let Some(address) = address {
        configuration.server.address = address;
    }

    if let Some(log_format) = log_format {
        configuration.tracing.logging.format = log_format;
    }

    Ok(configuration)
}

#[cfg(test)]
pub(crate) fn test_configuration() -> Configuration {
    config::Config::builder()
        .add_source(config::Config::try_from(&defaults::Defaults::default()).expect("Valid defaults"))
        .build()
        .expect("Built config")
        .try_deserialize()
        .expect("Deserialized config")
}
