use p7verify::audit::{self, AuditConfig, LogDestination};
use p7verify::{
    CertificateInfo, FixedTimeSource, KeyError, SignerKey, SigningTime, Verifier, VerifierConfig,
    VerifyError,
};

use p7verify::reexports::log;

use chrono::{DateTime, Utc};
use clap::{crate_description, crate_name, crate_version, Arg, ArgAction, ArgMatches, Command};
use serde::Serialize;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

/// Single JSON object printed by `verify`.
#[derive(Debug, Serialize)]
struct VerifyReport {
    error: bool,
    reason: String,
    error_code: i32,
    #[serde(rename = "signingTime", skip_serializing_if = "Option::is_none")]
    signing_time: Option<String>,
}

impl VerifyReport {
    fn success(signing_time: Option<SigningTime>) -> Self {
        VerifyReport {
            error: false,
            reason: "Signature verified".to_string(),
            error_code: 0,
            signing_time: signing_time.map(|t| t.to_reference_string()),
        }
    }

    fn failure(err: &VerifyError, reason: String, signing_time: Option<SigningTime>) -> Self {
        VerifyReport {
            error: true,
            reason,
            error_code: error_code(err),
            signing_time: signing_time.map(|t| t.to_reference_string()),
        }
    }
}

/// Process exit code for each error kind.
fn error_code(err: &VerifyError) -> i32 {
    match err {
        VerifyError::BadArgs => -1,
        VerifyError::InvalidX509(_) => -2,
        VerifyError::InvalidPkcs7(_) | VerifyError::NotSupported(_) => -3,
        VerifyError::CaVerificationFailed(_) => -4,
        VerifyError::SigningTimeRollback { .. } => -5,
        VerifyError::DigestMismatch => -6,
        VerifyError::SignatureMismatch => -7,
    }
}

/// Read a whole input file, reporting failures as `BadArgs`.
fn read_input(path: &str, what: &str) -> Result<Vec<u8>, VerifyReport> {
    std::fs::read(path).map_err(|e| {
        VerifyReport::failure(
            &VerifyError::BadArgs,
            format!("Failed to read {} '{}': {}", what, path, e),
            None,
        )
    })
}

fn parse_time_arg(value: &str, what: &str) -> Result<SigningTime, VerifyReport> {
    SigningTime::parse_reference(value).map_err(|e| {
        VerifyReport::failure(
            &VerifyError::BadArgs,
            format!("Invalid {} '{}': {}", what, value, e),
            None,
        )
    })
}

struct VerifyArgs<'a> {
    signature: &'a str,
    root_ca: &'a str,
    data: &'a str,
    reference: Option<&'a str>,
    at: Option<&'a str>,
}

fn run_verify(args: &VerifyArgs<'_>) -> VerifyReport {
    match try_verify(args) {
        Ok(report) | Err(report) => report,
    }
}

fn try_verify(args: &VerifyArgs<'_>) -> Result<VerifyReport, VerifyReport> {
    let signature = read_input(args.signature, "signature")?;
    let root_ca = read_input(args.root_ca, "root CA")?;
    let reference = args
        .reference
        .map(|r| parse_time_arg(r, "reference time"))
        .transpose()?;

    let mut config = VerifierConfig::default();
    if let Some(at) = args.at {
        let at = parse_time_arg(at, "validation time")?;
        config = config.with_time_source(Arc::new(FixedTimeSource::from_signing_time(at)));
    }

    let data = File::open(args.data).map_err(|e| {
        VerifyReport::failure(
            &VerifyError::BadArgs,
            format!("Failed to open data '{}': {}", args.data, e),
            None,
        )
    })?;

    let verifier = Verifier::with_config(config);
    let outcome = verifier.verify_reader(&signature, &root_ca, reference, BufReader::new(data));
    Ok(match outcome.result {
        Ok(()) => VerifyReport::success(outcome.signing_time),
        Err(e) => VerifyReport::failure(&e, e.to_string(), outcome.signing_time),
    })
}

/// JSON object printed by `cert-info`.
#[derive(Debug, Serialize)]
struct CertInfoReport {
    serial: String,
    subject: String,
    issuer: String,
    not_before: String,
    not_after: String,
    key_algorithm: String,
    key_type: String,
    /// Affine EC coordinates, hex.
    #[serde(skip_serializing_if = "Option::is_none")]
    ec_x: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ec_y: Option<String>,
    /// Whether the certificate is within its validity window at the check time.
    valid: bool,
}

fn cert_info(path: impl AsRef<Path>, at: DateTime<Utc>) -> Result<CertInfoReport, KeyError> {
    let path = path.as_ref();
    let pem = std::fs::read(path).map_err(|e| {
        KeyError::InvalidCertificate(format!("Failed to read '{}': {}", path.display(), e))
    })?;
    let info = CertificateInfo::from_pem(&pem)?;
    let key = info.public_key()?;
    let (ec_x, ec_y) = match &key {
        SignerKey::Ec(ec) => {
            let (x, y) = ec.affine_coordinates();
            (Some(hex::encode(x)), Some(hex::encode(y)))
        }
        SignerKey::Rsa(_) => (None, None),
    };
    Ok(CertInfoReport {
        serial: info.serial_hex(),
        subject: info.subject.clone(),
        issuer: info.issuer.clone(),
        not_before: info.not_before.to_rfc3339(),
        not_after: info.not_after.to_rfc3339(),
        key_algorithm: info.key_algorithm.clone(),
        key_type: key.algorithm_name().to_string(),
        ec_x,
        ec_y,
        valid: info.is_valid_at(at),
    })
}

fn build_command() -> Command {
    Command::new(crate_name!())
        .version(crate_version!())
        .about(crate_description!())
        .arg(
            Arg::new("verbose")
                .short('v')
                .action(ArgAction::SetTrue)
                .help("Verbose output"),
        )
        .arg(
            Arg::new("debug")
                .short('d')
                .action(ArgAction::SetTrue)
                .help("Prints debugging information"),
        )
        .arg(
            Arg::new("audit")
                .long("audit")
                .action(ArgAction::SetTrue)
                .help("Enable structured audit logging (JSON to stderr)"),
        )
        .arg(
            Arg::new("audit-file")
                .long("audit-file")
                .value_name("FILE")
                .help("Write audit logs to FILE instead of stderr"),
        )
        .subcommand_required(true)
        .subcommand(
            Command::new("verify")
                .about("Verify a detached PKCS#7 signature over a data file")
                .arg(
                    Arg::new("signature")
                        .value_name("signature_file")
                        .long("signature")
                        .short('s')
                        .required(true)
                        .help("PEM-encoded PKCS#7 signature"),
                )
                .arg(
                    Arg::new("root_ca")
                        .value_name("root_ca_file")
                        .long("root-ca")
                        .short('r')
                        .required(true)
                        .help("PEM-encoded root CA certificate"),
                )
                .arg(
                    Arg::new("data")
                        .value_name("data_file")
                        .long("data")
                        .short('i')
                        .required(true)
                        .help("Signed data"),
                )
                .arg(
                    Arg::new("reference")
                        .value_name("MM/DD/YYYY HH:mm:SS")
                        .long("reference")
                        .short('t')
                        .help("Reject signatures made before this time"),
                )
                .arg(
                    Arg::new("at")
                        .value_name("MM/DD/YYYY HH:mm:SS")
                        .long("at")
                        .help("Check certificate validity at this time instead of now"),
                ),
        )
        .subcommand(
            Command::new("cert-info")
                .about("Print the identifying fields and public key of a certificate")
                .arg(
                    Arg::new("cert")
                        .value_name("certificate_file")
                        .long("cert")
                        .short('c')
                        .required(true)
                        .help("PEM-encoded certificate"),
                )
                .arg(
                    Arg::new("at")
                        .value_name("MM/DD/YYYY HH:mm:SS")
                        .long("at")
                        .help("Report validity at this time instead of now"),
                ),
        )
}

fn print_json<T: Serialize>(value: &T) -> i32 {
    match serde_json::to_string(value) {
        Ok(json) => {
            println!("{json}");
            0
        }
        Err(e) => {
            eprintln!("Failed to serialize output: {e}");
            1
        }
    }
}

fn start() -> i32 {
    let matches = build_command().get_matches();

    let verbose = matches.get_flag("verbose");
    let debug = matches.get_flag("debug");
    let audit_enabled = matches.get_flag("audit");
    let audit_file = matches.get_one::<String>("audit-file").map(|s| s.as_str());

    // stdout carries exactly one JSON object; diagnostics go to stderr
    env_logger::builder()
        .format_timestamp(None)
        .format_level(false)
        .format_module_path(false)
        .format_target(false)
        .filter_level(if debug {
            log::LevelFilter::Debug
        } else if verbose {
            log::LevelFilter::Info
        } else {
            log::LevelFilter::Warn
        })
        .init();

    if audit_enabled || audit_file.is_some() {
        let destination = match audit_file {
            Some(path) => LogDestination::File(path.to_string()),
            None => LogDestination::Stderr,
        };
        if let Err(e) = audit::init(AuditConfig {
            destination,
            ..AuditConfig::default()
        }) {
            log::warn!("Audit logging disabled: {}", e);
        }
    }

    match matches.subcommand() {
        Some(("verify", matches)) => verify_command(matches),
        Some(("cert-info", matches)) => cert_info_command(matches),
        _ => {
            eprintln!("No subcommand specified");
            1
        }
    }
}

fn verify_command(matches: &ArgMatches) -> i32 {
    let arg = |name: &str| matches.get_one::<String>(name).map(|s| s.as_str());
    let (Some(signature), Some(root_ca), Some(data)) = (arg("signature"), arg("root_ca"), arg("data"))
    else {
        let report = VerifyReport::failure(
            &VerifyError::BadArgs,
            "Missing required argument".to_string(),
            None,
        );
        print_json(&report);
        return report.error_code;
    };
    let report = run_verify(&VerifyArgs {
        signature,
        root_ca,
        data,
        reference: arg("reference"),
        at: arg("at"),
    });
    if report.error {
        log::info!("{}", report.reason);
    }
    match print_json(&report) {
        0 => report.error_code,
        status => status,
    }
}

fn cert_info_command(matches: &ArgMatches) -> i32 {
    let Some(cert) = matches.get_one::<String>("cert") else {
        eprintln!("Missing certificate file");
        return 1;
    };
    let at = match matches.get_one::<String>("at") {
        None => Utc::now(),
        Some(value) => match SigningTime::parse_reference(value)
            .ok()
            .and_then(|t| t.to_naive())
        {
            Some(naive) => naive.and_utc(),
            None => {
                eprintln!("Invalid validation time '{value}'");
                return 1;
            }
        },
    };
    match cert_info(cert, at) {
        Ok(report) => print_json(&report),
        Err(e) => {
            eprintln!("{e}");
            1
        }
    }
}

fn main() {
    std::process::exit(start());
}
