use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use rand::Rng;
use serde::Serialize;
use serde_json::json;

use farm_cli::{
    config::RuntimeConfig,
    error::{AppError, ErrorKind},
    logging,
    model::{
        AssessOutput, ForecastDay, ForecastOutput, ForecastRequest, FreshnessStatus,
        HistoryOutput, HistoryRequest, ValidationError, observation_from_input,
    },
    providers::{HttpProviders, ProviderApi},
    service,
};

#[cfg(test)]
use farm_cli::{
    geocoding::ResolvedLocation,
    providers::{
        ProviderCurrent, ProviderError, ProviderForecast, ProviderForecastDay, ProviderHistory,
        ProviderHistoryDay,
    },
};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Farming-condition classifier and weather history CLI"
)]
struct Cli {
    /// Log provider, cache and fallback decisions to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Classify one weather observation.
    Assess {
        /// Air temperature in °C.
        #[arg(long, allow_negative_numbers = true)]
        temperature: f64,
        /// Relative humidity in percent.
        #[arg(long, allow_negative_numbers = true)]
        humidity: f64,
        /// Rainfall in mm.
        #[arg(long, allow_negative_numbers = true)]
        rainfall: f64,
        /// Wind speed in m/s.
        #[arg(long, allow_negative_numbers = true)]
        wind_speed: f64,
        #[arg(long, value_enum)]
        output: Option<OutputModeArg>,
        #[arg(long)]
        json: bool,
    },
    /// Classified weather for the past days at a location.
    History {
        #[arg(long)]
        city: Option<String>,
        #[arg(long, allow_negative_numbers = true)]
        lat: Option<f64>,
        #[arg(long, allow_negative_numbers = true)]
        lon: Option<f64>,
        /// Number of past days (1-30).
        #[arg(long)]
        days: Option<usize>,
        #[arg(long, value_enum)]
        output: Option<OutputModeArg>,
        #[arg(long)]
        json: bool,
    },
    /// Current conditions and the outlook for the next days at a location.
    Forecast {
        #[arg(long)]
        city: Option<String>,
        #[arg(long, allow_negative_numbers = true)]
        lat: Option<f64>,
        #[arg(long, allow_negative_numbers = true)]
        lon: Option<f64>,
        #[arg(long, value_enum)]
        output: Option<OutputModeArg>,
        #[arg(long)]
        json: bool,
    },
}

const ENVELOPE_SCHEMA_VERSION: &str = "v1";
const COMMAND_ASSESS: &str = "farm.assess";
const COMMAND_HISTORY: &str = "farm.history";
const COMMAND_FORECAST: &str = "farm.forecast";
const ERROR_CODE_USER_INVALID_INPUT: &str = "user.invalid_input";
const ERROR_CODE_USER_OUTPUT_MODE_CONFLICT: &str = "user.output_mode_conflict";
const ERROR_CODE_RUNTIME_PROVIDER_INIT: &str = "runtime.provider_init_failed";
const ERROR_CODE_RUNTIME_PROVIDER_FAILED: &str = "runtime.provider_failed";
const ERROR_CODE_RUNTIME_SERIALIZE: &str = "runtime.serialize_failed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputModeArg {
    Human,
    Json,
    AlfredJson,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CliOutputMode {
    Human,
    Json,
    AlfredJson,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliError {
    kind: ErrorKind,
    code: &'static str,
    message: String,
}

impl CliError {
    fn user(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::User,
            code,
            message: message.into(),
        }
    }

    fn runtime(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Runtime,
            code,
            message: message.into(),
        }
    }

    fn exit_code(&self) -> i32 {
        match self.kind {
            ErrorKind::User => 2,
            ErrorKind::Runtime => 1,
        }
    }
}

impl From<OutputModeArg> for CliOutputMode {
    fn from(value: OutputModeArg) -> Self {
        match value {
            OutputModeArg::Human => CliOutputMode::Human,
            OutputModeArg::Json => CliOutputMode::Json,
            OutputModeArg::AlfredJson => CliOutputMode::AlfredJson,
        }
    }
}

impl Cli {
    fn command_name(&self) -> &'static str {
        match &self.command {
            Commands::Assess { .. } => COMMAND_ASSESS,
            Commands::History { .. } => COMMAND_HISTORY,
            Commands::Forecast { .. } => COMMAND_FORECAST,
        }
    }

    fn output_mode_hint(&self) -> CliOutputMode {
        match &self.command {
            Commands::Assess { output, json, .. }
            | Commands::History { output, json, .. }
            | Commands::Forecast { output, json, .. } => {
                if *json {
                    CliOutputMode::Json
                } else if let Some(explicit) = output {
                    (*explicit).into()
                } else {
                    CliOutputMode::Human
                }
            }
        }
    }
}

fn main() {
    let cli = Cli::parse();
    logging::init_cli_logger(cli.verbose);

    let command = cli.command_name();
    let output_mode = cli.output_mode_hint();
    match run(cli) {
        Ok(output) => println!("{output}"),
        Err(error) => {
            emit_error(command, output_mode, &error);
            std::process::exit(error.exit_code());
        }
    }
}

fn run(cli: Cli) -> Result<String, CliError> {
    let config = RuntimeConfig::from_env();
    let providers = HttpProviders::new()
        .map_err(|error| runtime_error(ERROR_CODE_RUNTIME_PROVIDER_INIT, error.to_string()))?;
    run_with(cli, &config, &providers, Utc::now, &mut rand::rng())
}

fn run_with<P, N, R>(
    cli: Cli,
    config: &RuntimeConfig,
    providers: &P,
    now_fn: N,
    rng: &mut R,
) -> Result<String, CliError>
where
    P: ProviderApi,
    N: Fn() -> DateTime<Utc>,
    R: Rng + ?Sized,
{
    match cli.command {
        Commands::Assess {
            temperature,
            humidity,
            rainfall,
            wind_speed,
            output,
            json,
        } => {
            let output_mode = resolve_output_mode(output, json, CliOutputMode::Human)?;
            let observation = observation_from_input(temperature, humidity, rainfall, wind_speed)
                .map_err(user_invalid_input)?;
            let output = AssessOutput::new(observation);
            tracing::debug!(
                condition = output.assessment.condition.as_str(),
                score = output.assessment.score,
                "classified observation"
            );

            match output_mode {
                CliOutputMode::Json => render_json_envelope(COMMAND_ASSESS, &output),
                CliOutputMode::Human => Ok(format_assess_text(&output)),
                CliOutputMode::AlfredJson => render_assess_alfred_json(&output),
            }
        }
        Commands::History {
            city,
            lat,
            lon,
            days,
            output,
            json,
        } => {
            let output_mode = resolve_output_mode(output, json, CliOutputMode::Human)?;
            let city = city_or_default(config, city, lat, lon);
            let request = HistoryRequest::new(
                city.as_deref(),
                lat,
                lon,
                days.unwrap_or(config.history_days),
            )
            .map_err(user_invalid_input)?;
            let output = service::resolve_history(config, providers, now_fn, rng, &request)
                .map_err(map_app_error)?;

            match output_mode {
                CliOutputMode::Json => render_json_envelope(COMMAND_HISTORY, &output),
                CliOutputMode::Human => Ok(format_history_text(&output)),
                CliOutputMode::AlfredJson => render_history_alfred_json(&output),
            }
        }
        Commands::Forecast {
            city,
            lat,
            lon,
            output,
            json,
        } => {
            let output_mode = resolve_output_mode(output, json, CliOutputMode::Human)?;
            let city = city_or_default(config, city, lat, lon);
            let request =
                ForecastRequest::new(city.as_deref(), lat, lon).map_err(user_invalid_input)?;
            let output = service::resolve_forecast(config, providers, now_fn, &request)
                .map_err(map_app_error)?;

            match output_mode {
                CliOutputMode::Json => render_json_envelope(COMMAND_FORECAST, &output),
                CliOutputMode::Human => Ok(format_forecast_text(&output)),
                CliOutputMode::AlfredJson => render_forecast_alfred_json(&output),
            }
        }
    }
}

/// No location flags at all means the configured default city.
fn city_or_default(
    config: &RuntimeConfig,
    city: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
) -> Option<String> {
    match (city, lat, lon) {
        (None, None, None) => Some(config.default_city.clone()),
        (city, _, _) => city,
    }
}

fn resolve_output_mode(
    output: Option<OutputModeArg>,
    json_flag: bool,
    default_mode: CliOutputMode,
) -> Result<CliOutputMode, CliError> {
    match (output.map(Into::into), json_flag) {
        (Some(mode), true) if mode != CliOutputMode::Json => Err(user_error(
            ERROR_CODE_USER_OUTPUT_MODE_CONFLICT,
            format!(
                "conflicting output flags: --json requires --output json (got {})",
                output_mode_label(mode)
            ),
        )),
        (Some(mode), _) => Ok(mode),
        (None, true) => Ok(CliOutputMode::Json),
        (None, false) => Ok(default_mode),
    }
}

fn render_json_envelope<T: Serialize>(command: &str, output: &T) -> Result<String, CliError> {
    let result = serde_json::to_value(output).map_err(|error| {
        runtime_error(
            ERROR_CODE_RUNTIME_SERIALIZE,
            format!("failed to serialize output: {error}"),
        )
    })?;
    serde_json::to_string(&json!({
        "schema_version": ENVELOPE_SCHEMA_VERSION,
        "command": command,
        "ok": true,
        "result": result,
    }))
    .map_err(|error| {
        runtime_error(
            ERROR_CODE_RUNTIME_SERIALIZE,
            format!("failed to serialize output envelope: {error}"),
        )
    })
}

fn render_assess_alfred_json(output: &AssessOutput) -> Result<String, CliError> {
    let observation = &output.observation;
    let payload = json!({
        "items": [{
            "title": format!(
                "{} (score {})",
                condition_title(output.assessment.condition),
                output.assessment.score
            ),
            "subtitle": output.assessment.advice,
            "arg": output.assessment.condition.as_str(),
            "valid": false,
        }, {
            "title": observation_line(
                observation.temperature,
                observation.humidity,
                observation.rainfall,
                observation.wind_speed,
            ),
            "subtitle": "observation",
            "valid": false,
        }]
    });

    serialize_alfred(&payload)
}

fn render_history_alfred_json(output: &HistoryOutput) -> Result<String, CliError> {
    let mut items = Vec::with_capacity(output.days.len() + 1);
    items.push(json!({
        "title": format!("{} ({})", output.location.name, output.timezone),
        "subtitle": format!(
            "{} | source={} freshness={}",
            summary_line(output),
            output.source,
            output.freshness.status.as_str()
        ),
        "arg": output.location.name,
        "valid": false,
    }));

    for day in &output.days {
        items.push(json!({
            "title": format!(
                "{} {} ({}) {}",
                day.label,
                condition_title(day.condition),
                day.score,
                observation_line(
                    day.temperature_c,
                    day.humidity_pct,
                    day.rainfall_mm,
                    day.wind_speed_ms,
                )
            ),
            "subtitle": day.advice,
            "arg": day.date,
            "valid": false,
        }));
    }

    serialize_alfred(&json!({ "items": items }))
}

fn render_forecast_alfred_json(output: &ForecastOutput) -> Result<String, CliError> {
    let current = &output.current;
    let mut items = Vec::with_capacity(output.days.len() + 1);
    items.push(json!({
        "title": format!(
            "{} now: {} {}",
            output.location.name,
            current.description,
            observation_line(
                current.temperature_c,
                current.humidity_pct,
                current.rainfall_mm,
                current.wind_speed_ms,
            )
        ),
        "subtitle": format!(
            "{} ({}) {}",
            condition_title(current.condition),
            current.score,
            current.advice
        ),
        "arg": output.location.name,
        "valid": false,
    }));

    for day in &output.days {
        items.push(json!({
            "title": forecast_day_line(day),
            "subtitle": format!(
                "source={} freshness={}",
                output.source,
                output.freshness.status.as_str()
            ),
            "arg": day.date,
            "valid": false,
        }));
    }

    serialize_alfred(&json!({ "items": items }))
}

fn serialize_alfred(payload: &serde_json::Value) -> Result<String, CliError> {
    serde_json::to_string(payload).map_err(|error| {
        runtime_error(
            ERROR_CODE_RUNTIME_SERIALIZE,
            format!("failed to serialize Alfred output: {error}"),
        )
    })
}

fn emit_error(command: &str, output_mode: CliOutputMode, error: &CliError) {
    match output_mode {
        CliOutputMode::Json => {
            let payload = json!({
                "schema_version": ENVELOPE_SCHEMA_VERSION,
                "command": command,
                "ok": false,
                "error": {
                    "code": error.code,
                    "message": error.message,
                    "details": {
                        "kind": error_kind_label(error.kind),
                        "exit_code": error.exit_code(),
                    }
                }
            });
            let rendered = serde_json::to_string(&payload).unwrap_or_else(|serialize_error| {
                format!(
                    "{{\"schema_version\":\"{}\",\"command\":\"{}\",\"ok\":false,\"error\":{{\"code\":\"{}\",\"message\":{}}}}}",
                    ENVELOPE_SCHEMA_VERSION,
                    command,
                    ERROR_CODE_RUNTIME_SERIALIZE,
                    serde_json::Value::String(format!(
                        "failed to serialize error envelope: {serialize_error}"
                    )),
                )
            });
            println!("{rendered}");
        }
        CliOutputMode::AlfredJson => {
            let payload = json!({
                "items": [{
                    "title": format!("Error [{}]", error.code),
                    "subtitle": error.message,
                    "valid": false
                }]
            });
            let rendered = serde_json::to_string(&payload).unwrap_or_else(|_| {
                "{\"items\":[{\"title\":\"Error\",\"subtitle\":\"failed to serialize error output\",\"valid\":false}]}".to_string()
            });
            println!("{rendered}");
        }
        CliOutputMode::Human => {
            eprintln!("error[{}]: {}", error.code, error.message);
        }
    }
}

fn user_invalid_input(error: ValidationError) -> CliError {
    user_error(ERROR_CODE_USER_INVALID_INPUT, error.to_string())
}

fn user_error(code: &'static str, message: impl Into<String>) -> CliError {
    CliError::user(code, message)
}

fn runtime_error(code: &'static str, message: impl Into<String>) -> CliError {
    CliError::runtime(code, message)
}

fn map_app_error(error: AppError) -> CliError {
    match error.kind {
        ErrorKind::User => user_error(ERROR_CODE_USER_INVALID_INPUT, error.message),
        ErrorKind::Runtime => runtime_error(ERROR_CODE_RUNTIME_PROVIDER_FAILED, error.message),
    }
}

fn error_kind_label(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::User => "user",
        ErrorKind::Runtime => "runtime",
    }
}

fn output_mode_label(mode: CliOutputMode) -> &'static str {
    match mode {
        CliOutputMode::Human => "human",
        CliOutputMode::Json => "json",
        CliOutputMode::AlfredJson => "alfred-json",
    }
}

fn condition_title(condition: farming_core::FarmingCondition) -> &'static str {
    match condition {
        farming_core::FarmingCondition::Excellent => "Excellent",
        farming_core::FarmingCondition::Good => "Good",
        farming_core::FarmingCondition::Fair => "Fair",
        farming_core::FarmingCondition::Poor => "Poor",
    }
}

fn observation_line(temperature: f64, humidity: f64, rainfall: f64, wind_speed: f64) -> String {
    format!("{temperature:.1}°C {humidity:.0}% rain:{rainfall:.1}mm wind:{wind_speed:.1}m/s")
}

fn forecast_day_line(day: &ForecastDay) -> String {
    format!(
        "{} {} {:.0}~{:.0}°C",
        day.label, day.description, day.temp_min_c, day.temp_max_c
    )
}

fn summary_line(output: &HistoryOutput) -> String {
    let summary = &output.summary;
    let mut line = format!(
        "excellent={} good={} fair={} poor={}",
        summary.excellent, summary.good, summary.fair, summary.poor
    );
    if let Some(dominant) = summary.dominant() {
        line.push_str(&format!(" | mostly {}", dominant.as_str()));
    }
    line
}

fn format_assess_text(output: &AssessOutput) -> String {
    let observation = &output.observation;
    [
        format!(
            "{} (score {}) | {}",
            condition_title(output.assessment.condition),
            output.assessment.score,
            observation_line(
                observation.temperature,
                observation.humidity,
                observation.rainfall,
                observation.wind_speed,
            )
        ),
        output.assessment.advice.clone(),
    ]
    .join("\n")
}

fn format_history_text(output: &HistoryOutput) -> String {
    let mut lines = vec![format!(
        "{} ({}) | source={} | freshness={}",
        output.location.name,
        output.timezone,
        output.source,
        output.freshness.status.as_str()
    )];

    for day in &output.days {
        lines.push(format!(
            "{} {} ({}) {} {} | {}",
            day.label,
            condition_title(day.condition),
            day.score,
            observation_line(
                day.temperature_c,
                day.humidity_pct,
                day.rainfall_mm,
                day.wind_speed_ms,
            ),
            day.description,
            day.advice
        ));
    }

    if output.freshness.status == FreshnessStatus::SyntheticFallback {
        lines.push("note: provider unavailable, showing generated weather".to_string());
    }
    lines.push(format!("summary: {}", summary_line(output)));
    lines.join("\n")
}

fn format_forecast_text(output: &ForecastOutput) -> String {
    let current = &output.current;
    let mut lines = vec![
        format!(
            "{} ({}) | source={} | freshness={}",
            output.location.name,
            output.timezone,
            output.source,
            output.freshness.status.as_str()
        ),
        format!(
            "now: {} {}",
            current.description,
            observation_line(
                current.temperature_c,
                current.humidity_pct,
                current.rainfall_mm,
                current.wind_speed_ms,
            )
        ),
        format!(
            "farming: {} ({}) | {}",
            condition_title(current.condition),
            current.score,
            current.advice
        ),
    ];
    lines.extend(output.days.iter().map(forecast_day_line));
    lines.join("\n")
}
