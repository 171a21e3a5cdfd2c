//! The load-generator command-line builder: turns one `ClientConfig` into
//! the flag list `perf_analyzer` expects, in a fixed order — single-dash
//! options first, then verbose `--flag` switches, then user `--key=value`
//! overrides, which win over anything core-computed with the same key.

use search_types::{ClientConfig, LoadSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Http,
    Grpc,
}

impl Protocol {
    fn as_flag(self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Grpc => "grpc",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeasurementMode {
    TimeWindows,
    CountWindows,
}

impl MeasurementMode {
    fn as_flag(self) -> &'static str {
        match self {
            MeasurementMode::TimeWindows => "time_windows",
            MeasurementMode::CountWindows => "count_windows",
        }
    }
}

/// SSL flags, grouped since grpc and https carry independent equivalents of
/// the same four settings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SslSettings {
    pub grpc_use_ssl: bool,
    pub grpc_root_certifications_file: Option<String>,
    pub grpc_private_key_file: Option<String>,
    pub grpc_certificate_chain_file: Option<String>,
    pub https_verify_peer: Option<u32>,
    pub https_verify_host: Option<u32>,
    pub https_ca_certificates_file: Option<String>,
    pub https_client_certificate_file: Option<String>,
    pub https_client_certificate_type: Option<String>,
    pub https_private_key_file: Option<String>,
    pub https_private_key_type: Option<String>,
}

/// Global settings shared across every model's sweep in one search.
/// Per-model overrides arrive via `ClientConfig::extra_flags`.
#[derive(Debug, Clone, PartialEq)]
pub struct PerfAnalyzerSettings {
    pub protocol: Protocol,
    pub url: String,
    pub measurement_mode: MeasurementMode,
    pub measurement_interval_ms: u32,
    pub request_distribution: Option<String>,
    pub shape: Option<String>,
    pub input_data: Option<String>,
    pub shared_memory: Option<String>,
    pub output_shared_memory_size: Option<u32>,
    pub percentile: Option<u32>,
    pub max_threads: Option<u32>,
    pub stability_percentage: Option<f64>,
    pub latency_threshold: Option<u32>,
    pub string_length: Option<u32>,
    pub string_data: Option<String>,
    pub async_mode: bool,
    pub streaming: bool,
    pub ssl: SslSettings,
    /// `-f`: CSV report path `CommandLineProfiler` parses metrics from.
    pub latency_report_file: String,
}

impl Default for PerfAnalyzerSettings {
    fn default() -> Self {
        Self {
            protocol: Protocol::Http,
            url: "localhost:8000".to_string(),
            measurement_mode: MeasurementMode::CountWindows,
            measurement_interval_ms: 1000,
            request_distribution: None,
            shape: None,
            input_data: None,
            shared_memory: None,
            output_shared_memory_size: None,
            percentile: None,
            max_threads: None,
            stability_percentage: None,
            latency_threshold: None,
            string_length: None,
            string_data: None,
            async_mode: true,
            streaming: false,
            ssl: SslSettings::default(),
            latency_report_file: "perf_analyzer_report.csv".to_string(),
        }
    }
}

/// One flag, with the key stripped of leading dashes so it can be matched
/// against a user override key (`ClientConfig::extra_flags` is keyed without
/// dashes per its doc comment).
struct Flag {
    rendered: &'static str,
    key: &'static str,
    value: Option<String>,
}

fn flag(rendered: &'static str, key: &'static str, value: Option<String>) -> Flag {
    Flag { rendered, key, value }
}

/// Builds the full argument list for one model's `perf_analyzer` invocation.
pub fn build_args(model_name: &str, client: &ClientConfig, settings: &PerfAnalyzerSettings) -> Vec<String> {
    let single_dash = vec![
        flag("-m", "m", Some(model_name.to_string())),
        flag("-b", "b", Some(client.batch_size.to_string())),
        flag("-i", "i", Some(settings.protocol.as_flag().to_string())),
        flag("-u", "u", Some(settings.url.clone())),
        flag("-f", "f", Some(settings.latency_report_file.clone())),
    ];

    let mut verbose = vec![
        flag(
            "--measurement-mode",
            "measurement-mode",
            Some(settings.measurement_mode.as_flag().to_string()),
        ),
        flag(
            "--measurement-interval",
            "measurement-interval",
            Some(settings.measurement_interval_ms.to_string()),
        ),
    ];
    match client.load {
        LoadSpec::Concurrency(c) => verbose.push(flag(
            "--concurrency-range",
            "concurrency-range",
            Some(c.to_string()),
        )),
        LoadSpec::RequestRate(r) => verbose.push(flag(
            "--request-rate-range",
            "request-rate-range",
            Some(r.to_string()),
        )),
    }
    push_opt(&mut verbose, "--request-distribution", "request-distribution", &settings.request_distribution);
    push_opt(&mut verbose, "--shape", "shape", &settings.shape);
    push_opt(&mut verbose, "--input-data", "input-data", &settings.input_data);
    push_opt(&mut verbose, "--shared-memory", "shared-memory", &settings.shared_memory);
    push_opt_num(
        &mut verbose,
        "--output-shared-memory-size",
        "output-shared-memory-size",
        settings.output_shared_memory_size,
    );
    push_opt_num(&mut verbose, "--percentile", "percentile", settings.percentile);
    push_opt_num(&mut verbose, "--max-threads", "max-threads", settings.max_threads);
    if let Some(p) = settings.stability_percentage {
        verbose.push(flag("--stability-percentage", "stability-percentage", Some(p.to_string())));
    }
    push_opt_num(&mut verbose, "--latency-threshold", "latency-threshold", settings.latency_threshold);
    push_opt_num(&mut verbose, "--string-length", "string-length", settings.string_length);
    push_opt(&mut verbose, "--string-data", "string-data", &settings.string_data);

    if settings.async_mode {
        verbose.push(flag("--async", "async", None));
    } else {
        verbose.push(flag("--sync", "sync", None));
    }
    if settings.streaming {
        verbose.push(flag("--streaming", "streaming", None));
    }

    let ssl = &settings.ssl;
    if ssl.grpc_use_ssl {
        verbose.push(flag("--ssl-grpc-use-ssl", "ssl-grpc-use-ssl", None));
    }
    push_opt(
        &mut verbose,
        "--ssl-grpc-root-certifications-file",
        "ssl-grpc-root-certifications-file",
        &ssl.grpc_root_certifications_file,
    );
    push_opt(
        &mut verbose,
        "--ssl-grpc-private-key-file",
        "ssl-grpc-private-key-file",
        &ssl.grpc_private_key_file,
    );
    push_opt(
        &mut verbose,
        "--ssl-grpc-certificate-chain-file",
        "ssl-grpc-certificate-chain-file",
        &ssl.grpc_certificate_chain_file,
    );
    push_opt_num(&mut verbose, "--ssl-https-verify-peer", "ssl-https-verify-peer", ssl.https_verify_peer);
    push_opt_num(&mut verbose, "--ssl-https-verify-host", "ssl-https-verify-host", ssl.https_verify_host);
    push_opt(
        &mut verbose,
        "--ssl-https-ca-certificates-file",
        "ssl-https-ca-certificates-file",
        &ssl.https_ca_certificates_file,
    );
    push_opt(
        &mut verbose,
        "--ssl-https-client-certificate-file",
        "ssl-https-client-certificate-file",
        &ssl.https_client_certificate_file,
    );
    push_opt(
        &mut verbose,
        "--ssl-https-client-certificate-type",
        "ssl-https-client-certificate-type",
        &ssl.https_client_certificate_type,
    );
    push_opt(
        &mut verbose,
        "--ssl-https-private-key-file",
        "ssl-https-private-key-file",
        &ssl.https_private_key_file,
    );
    push_opt(
        &mut verbose,
        "--ssl-https-private-key-type",
        "ssl-https-private-key-type",
        &ssl.https_private_key_type,
    );

    let mut args = Vec::new();
    for f in &single_dash {
        if client.extra_flags.contains_key(f.key) {
            continue;
        }
        args.push(f.rendered.to_string());
        if let Some(v) = &f.value {
            args.push(v.clone());
        }
    }
    for f in &verbose {
        if client.extra_flags.contains_key(f.key) {
            continue;
        }
        args.push(f.rendered.to_string());
        if let Some(v) = &f.value {
            args.push(v.clone());
        }
    }
    for (key, value) in &client.extra_flags {
        args.push(format!("--{key}={value}"));
    }
    args
}

fn push_opt(flags: &mut Vec<Flag>, rendered: &'static str, key: &'static str, value: &Option<String>) {
    if let Some(v) = value {
        flags.push(flag(rendered, key, Some(v.clone())));
    }
}

fn push_opt_num<T: ToString>(flags: &mut Vec<Flag>, rendered: &'static str, key: &'static str, value: Option<T>) {
    if let Some(v) = value {
        flags.push(flag(rendered, key, Some(v.to_string())));
    }
}
