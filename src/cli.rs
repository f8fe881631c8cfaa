//! Command-line argument parsing for sqlsheet.

use clap::{ArgGroup, Parser};
use sqlsheet::config::{
    normalize_sheet_name, parse_server_address, ConnectionConfig, ExportConfig, ExportDefaults,
    SslMode, DEFAULT_OUTPUT_FILE, DEFAULT_QUERY_EXTENSION,
};
use sqlsheet::error::Result;
use sqlsheet::export::{ExportFormat, TextEncoding};
use sqlsheet::secret::Secret;
use sqlsheet::source::{QueryInput, QuerySource};
use std::path::PathBuf;
use std::time::Duration;

/// Run SQL query files against PostgreSQL and export the results as
/// semicolon-delimited text or formatted XLSX.
#[derive(Parser, Debug)]
#[command(name = "sqlsheet")]
#[command(version, about, long_about = None)]
#[command(group(ArgGroup::new("input").required(true).args(["query_file", "query_folder"])))]
pub struct Cli {
    /// Single query file to run
    #[arg(short = 'f', long, value_name = "PATH")]
    pub query_file: Option<PathBuf>,

    /// Folder whose query files are all run
    #[arg(short = 'F', long, value_name = "DIR")]
    pub query_folder: Option<PathBuf>,

    /// Database server address (host or host:port)
    #[arg(short = 'S', long, value_name = "HOST[:PORT]")]
    pub server: Option<String>,

    /// Database port (overrides a port in --server)
    #[arg(short = 'p', long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Database name
    #[arg(short = 'd', long, value_name = "DATABASE")]
    pub database: Option<String>,

    /// Database user
    #[arg(short = 'U', long, value_name = "USER")]
    pub user: Option<String>,

    /// Database password
    #[arg(
        short = 'P',
        long,
        value_name = "PASSWORD",
        env = "SQLSHEET_PASSWORD",
        hide_env_values = true
    )]
    pub password: Option<String>,

    /// TLS mode; the server certificate is never verified
    #[arg(long, value_enum, value_name = "MODE")]
    pub ssl_mode: Option<SslMode>,

    /// Output directory [default: current directory]
    #[arg(short = 'o', long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Base name of the output files [default: QueryResults]
    #[arg(short = 'n', long, value_name = "NAME")]
    pub output_file: Option<String>,

    /// Output format
    #[arg(short = 't', long, value_enum, value_name = "FORMAT")]
    pub format: ExportFormat,

    /// Append _yyyyMMdd_HHmmss (run start time) to every output name
    #[arg(long)]
    pub timestamp: bool,

    /// Keep the intermediate .csv next to the .xlsx
    #[arg(long)]
    pub keep_csv: bool,

    /// Name of the worksheet in the .xlsx
    #[arg(long, value_name = "NAME")]
    pub sheet_name: Option<String>,

    /// Encoding of the .csv: windows-1252 (LEGACY default), another
    /// single-byte code page, utf-8, or utf-8-bom
    #[arg(long, value_name = "ENCODING")]
    pub encoding: Option<String>,

    /// Extension of query files picked up in folder mode [default: sql]
    #[arg(long, value_name = "EXT")]
    pub query_extension: Option<String>,

    /// Query timeout in seconds (0 = none)
    #[arg(long, value_name = "SECS")]
    pub query_timeout: Option<u64>,

    /// Keep running the remaining files after a failure
    #[arg(long)]
    pub continue_on_error: bool,

    /// Connection profile from the config file [default: default]
    #[arg(short = 'c', long, alias = "connection", value_name = "NAME")]
    pub profile: Option<String>,

    /// Config file path
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Write logs to this file instead of stderr
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Returns the config file path to use.
    ///
    /// Uses the --config argument if provided, otherwise the default path.
    pub fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(sqlsheet::config::Config::default_path)
    }

    /// Returns the connection profile to use, if specified.
    pub fn profile_name(&self) -> Option<&str> {
        self.profile.as_deref()
    }

    /// Converts CLI arguments to a ConnectionConfig.
    ///
    /// This creates a config from CLI args only, without merging with file config.
    pub fn to_connection_config(&self) -> Result<ConnectionConfig> {
        let (host, address_port) = match &self.server {
            Some(server) => {
                let (host, port) = parse_server_address(server)?;
                (Some(host), port)
            }
            None => (None, None),
        };

        Ok(ConnectionConfig {
            host,
            port: self.port.or(address_port),
            database: self.database.clone(),
            user: self.user.clone(),
            password: self.password.clone().map(Secret::from),
            sslmode: self.ssl_mode,
        })
    }

    /// Builds the export configuration; CLI values win over config file defaults.
    pub fn to_export_config(&self, defaults: &ExportDefaults) -> Result<ExportConfig> {
        let encoding = match self.encoding.as_deref().or(defaults.encoding.as_deref()) {
            Some(label) => label.parse::<TextEncoding>()?,
            None => TextEncoding::default(),
        };

        let sheet_name = normalize_sheet_name(
            self.sheet_name
                .as_deref()
                .or(defaults.sheet_name.as_deref()),
        );

        Ok(ExportConfig {
            output_dir: self
                .output_dir
                .clone()
                .or_else(|| defaults.output_dir.clone())
                .unwrap_or_else(|| PathBuf::from(".")),
            output_file: self
                .output_file
                .clone()
                .or_else(|| defaults.output_file.clone())
                .unwrap_or_else(|| DEFAULT_OUTPUT_FILE.to_string()),
            format: self.format,
            append_timestamp: self.timestamp,
            keep_intermediate: self.keep_csv,
            sheet_name,
            encoding,
            continue_on_error: self.continue_on_error,
        })
    }

    /// Returns the query timeout, if any.
    pub fn query_timeout(&self, defaults: &ExportDefaults) -> Option<Duration> {
        self.query_timeout
            .or(defaults.query_timeout_secs)
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    /// Returns the query source selected by --query-file or --query-folder.
    pub fn query_source(&self, defaults: &ExportDefaults) -> QuerySource {
        let input = match (&self.query_file, &self.query_folder) {
            (Some(file), _) => QueryInput::File(file.clone()),
            (None, Some(folder)) => QueryInput::Folder(folder.clone()),
            // clap's required "input" group guarantees one of the two.
            (None, None) => QueryInput::File(PathBuf::new()),
        };

        let extension = self
            .query_extension
            .as_deref()
            .or(defaults.query_extension.as_deref())
            .unwrap_or(DEFAULT_QUERY_EXTENSION);

        QuerySource::new(input, extension)
    }
}
