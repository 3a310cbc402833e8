// Copyright 2024 Paul Adamson
// Licensed under the Apache License, Version 2.0

//! Install-link building and validation.
//!
//! Turns a catalog [`IntegrationDescriptor`] into the custom-scheme URI the
//! AppLink desktop app registers a protocol handler for, or a typed
//! [`BuildError`] explaining why it refused.
//!
//! The builder is defending a *string transport*, not runtime behavior: it
//! has no sandbox and never executes anything, so validation is allowlist/
//! denylist pattern matching over the descriptor's strings. Anything that
//! resembles shell syntax is rejected before it can reach the query string.
//! Validation failure at any step discards the whole build - no partial URI
//! is ever produced.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use applink_protocol::{ConnectionTemplate, IntegrationDescriptor, TransportKind};

use crate::error::BuildError;

/// Fixed scheme-and-path prefix every install link starts with.
///
/// The desktop app's protocol-handler registration matches on this exact
/// prefix; anything else would be misinterpreted by the receiver.
pub const SCHEME_PREFIX: &str = "applink://desktop/install";

/// Maximum accepted install-link length in bytes.
///
/// Oversized custom-scheme URIs get silently truncated or refused by some
/// OS/browser combinations, which would corrupt the handoff.
pub const MAX_URI_LENGTH: usize = 2048;

/// Advisory appended when a template carries environment variables.
const ENV_DEFERRED_WARNING: &str =
    "Environment variables are not part of the install link; configure them in AppLink after installation";

/// Commands never allowed in an install link, matched case-insensitively
/// against the bare command name. Shell interpreters, remote-fetch tools,
/// privilege escalation, recursive deletion, inline evaluators.
const DENIED_COMMANDS: &[&str] = &[
    "sh", "bash", "zsh", "fish", "dash", "ksh", "csh", "tcsh", "powershell", "pwsh", "cmd",
    "cmd.exe", "curl", "wget", "nc", "ncat", "netcat", "sudo", "doas", "su", "rm", "rmdir", "del",
    "rd", "format", "mkfs", "dd", "eval", "exec",
];

/// Shell metacharacter substrings rejected anywhere inside an argument.
const SHELL_METACHARACTERS: &[&str] = &["&&", "||", ";", "|", "`", "$(", ">", "<", "../"];

/// Flags that make a benign binary evaluate inline code, matched exactly.
const EXEC_FLAGS: &[&str] = &["-e", "--eval", "-c", "--command", "--call"];

/// Destructive recursive-delete invocation smuggled inside one argument.
static DESTRUCTIVE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\brm\s+-[a-zA-Z]*[rf]").unwrap());

/// A validated, immutable install link.
///
/// Invariants, established by [`build`] and never re-checked downstream:
/// starts with [`SCHEME_PREFIX`], at most [`MAX_URI_LENGTH`] bytes, every
/// query value passed its sanitizer. Constructed once per handoff attempt
/// and discarded after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandoffUri(String);

impl HandoffUri {
    /// The link as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the wrapper, returning the underlying string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for HandoffUri {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for HandoffUri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Successful build output: the link plus advisory warnings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltLink {
    /// The validated install link.
    pub uri: HandoffUri,
    /// Non-fatal advisories for the install UI (currently only the
    /// environment-variable deferral notice).
    pub warnings: Vec<String>,
}

/// Build configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildOptions {
    /// Skips the security checks (denylist, argument patterns, header scan,
    /// final length/prefix validation) while keeping transport inference and
    /// field presence checks.
    ///
    /// For trusted call sites only, such as rendering a link preview in a
    /// detail view. Never use the output for an actual navigation attempt.
    pub skip_validation: bool,
}

/// Builds a validated install link from a catalog descriptor.
///
/// Always encodes `name` and `transport` as the first two query parameters,
/// then the variant-specific parameters: `command` and `args` for stdio,
/// `url` and `headers` for the network kinds.
///
/// Deterministic: the same descriptor always yields a byte-identical link
/// (maps are ordered, nothing time-dependent is embedded).
///
/// # Errors
///
/// Returns the first [`BuildError`] encountered; see the enum for the full
/// taxonomy. No URI is produced on any failure.
pub fn build(descriptor: &IntegrationDescriptor) -> Result<BuiltLink, BuildError> {
    build_with(descriptor, &BuildOptions::default())
}

/// [`build`] with explicit options.
pub fn build_with(
    descriptor: &IntegrationDescriptor,
    options: &BuildOptions,
) -> Result<BuiltLink, BuildError> {
    let template = descriptor
        .template
        .as_ref()
        .ok_or(BuildError::MissingTemplate)?;
    let transport = infer_transport(descriptor, template)?;

    let mut url = Url::parse(SCHEME_PREFIX).map_err(|_| BuildError::InvalidScheme {
        expected: SCHEME_PREFIX,
    })?;
    let mut warnings = Vec::new();

    {
        let mut pairs = url.query_pairs_mut();
        pairs.append_pair("name", &descriptor.name);
        pairs.append_pair("transport", transport.as_str());

        if transport.is_network() {
            let target = template
                .url
                .as_deref()
                .map(str::trim)
                .filter(|u| !u.is_empty())
                .ok_or_else(|| BuildError::MissingUrl {
                    transport: transport.as_str().to_string(),
                })?;
            pairs.append_pair("url", target);

            if let Some(headers) = template.headers.as_ref().filter(|h| !h.is_empty()) {
                if !options.skip_validation {
                    for (name, value) in headers {
                        check_header(name, value)?;
                    }
                }
                let encoded = serde_json::to_string(headers)
                    .map_err(|err| BuildError::HeaderEncoding(err.to_string()))?;
                pairs.append_pair("headers", &encoded);
            }
        } else {
            let command = template
                .command
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .ok_or(BuildError::MissingCommand)?;
            if !options.skip_validation {
                check_command(command)?;
            }
            pairs.append_pair("command", command);

            if !template.args.is_empty() {
                if !options.skip_validation {
                    for arg in &template.args {
                        check_argument(arg)?;
                    }
                }
                // Wire contract with the desktop app: args travel as one
                // comma-joined parameter. A literal comma inside an argument
                // is ambiguous on the receiving side; see DESIGN.md.
                pairs.append_pair("args", &template.args.join(","));
            }

            if template.env.as_ref().is_some_and(|env| !env.is_empty()) {
                warnings.push(ENV_DEFERRED_WARNING.to_string());
            }
        }
    }

    let assembled = String::from(url);
    if !options.skip_validation {
        if assembled.len() > MAX_URI_LENGTH {
            return Err(BuildError::UriTooLong {
                length: assembled.len(),
                max: MAX_URI_LENGTH,
            });
        }
        if !assembled.starts_with(SCHEME_PREFIX) {
            return Err(BuildError::InvalidScheme {
                expected: SCHEME_PREFIX,
            });
        }
    }

    Ok(BuiltLink {
        uri: HandoffUri(assembled),
        warnings,
    })
}

/// Renders the human-readable launch line a detail view shows.
///
/// stdio descriptors produce `command arg1 arg2 ...`; network descriptors
/// produce the target URL. Performs only presence checks - this is a
/// trusted display path, not a navigation path.
///
/// # Errors
///
/// Shape errors only: [`BuildError::MissingTemplate`],
/// [`BuildError::MissingTransport`], [`BuildError::MissingCommand`],
/// [`BuildError::MissingUrl`].
pub fn command_preview(descriptor: &IntegrationDescriptor) -> Result<String, BuildError> {
    let template = descriptor
        .template
        .as_ref()
        .ok_or(BuildError::MissingTemplate)?;
    let transport = infer_transport(descriptor, template)?;

    if transport.is_network() {
        template
            .url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(String::from)
            .ok_or_else(|| BuildError::MissingUrl {
                transport: transport.as_str().to_string(),
            })
    } else {
        let command = template
            .command
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or(BuildError::MissingCommand)?;
        let mut line = command.to_string();
        for arg in &template.args {
            line.push(' ');
            line.push_str(arg);
        }
        Ok(line)
    }
}

/// Determines which validation path runs.
///
/// The template's own tag wins. Absent that, a template with a command falls
/// back to the descriptor-level transport hint, defaulting to stdio - older
/// catalog entries predate the tag and are all stdio launchers.
fn infer_transport(
    descriptor: &IntegrationDescriptor,
    template: &ConnectionTemplate,
) -> Result<TransportKind, BuildError> {
    if let Some(tag) = template.transport {
        return Ok(tag);
    }
    if template.command.is_some() {
        return Ok(descriptor.transport.unwrap_or(TransportKind::Stdio));
    }
    if let Some(hint) = descriptor.transport {
        return Ok(hint);
    }
    Err(BuildError::MissingTransport {
        name: descriptor.name.clone(),
    })
}

/// Rejects denylisted commands by bare name, case-insensitively.
///
/// `/usr/bin/BASH` and `bash` are the same rejection: the path is stripped
/// and the name lowercased before the exact match.
fn check_command(command: &str) -> Result<(), BuildError> {
    let bare = command
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(command)
        .to_ascii_lowercase();
    if DENIED_COMMANDS.contains(&bare.as_str()) {
        return Err(BuildError::BlockedCommand {
            command: command.to_string(),
        });
    }
    Ok(())
}

/// Rejects arguments carrying shell syntax, traversal, destructive
/// invocations, or inline-execution flags.
fn check_argument(argument: &str) -> Result<(), BuildError> {
    if EXEC_FLAGS.contains(&argument) {
        return Err(BuildError::BlockedFlag {
            flag: argument.to_string(),
        });
    }
    for pattern in SHELL_METACHARACTERS {
        if argument.contains(pattern) {
            return Err(BuildError::DangerousArgument {
                pattern: (*pattern).to_string(),
                argument: argument.to_string(),
            });
        }
    }
    if DESTRUCTIVE_RE.is_match(argument) {
        return Err(BuildError::DangerousArgument {
            pattern: "rm -rf".to_string(),
            argument: argument.to_string(),
        });
    }
    Ok(())
}

/// Rejects header values carrying script tags or script-scheme payloads.
fn check_header(name: &str, value: &str) -> Result<(), BuildError> {
    let lowered = value.to_ascii_lowercase();
    if lowered.contains("<script") || lowered.contains("javascript:") {
        return Err(BuildError::UnsafeHeader {
            name: name.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn stdio_descriptor(command: &str, args: &[&str]) -> IntegrationDescriptor {
        let mut descriptor = IntegrationDescriptor::new("weather", "Weather");
        descriptor.template = Some(ConnectionTemplate {
            transport: Some(TransportKind::Stdio),
            command: Some(command.to_string()),
            args: args.iter().map(|a| (*a).to_string()).collect(),
            ..ConnectionTemplate::default()
        });
        descriptor
    }

    fn network_descriptor(url: &str, headers: &[(&str, &str)]) -> IntegrationDescriptor {
        let mut descriptor = IntegrationDescriptor::new("issues", "Issue Tracker");
        descriptor.template = Some(ConnectionTemplate {
            transport: Some(TransportKind::Sse),
            url: Some(url.to_string()),
            headers: (!headers.is_empty()).then(|| {
                headers
                    .iter()
                    .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                    .collect::<BTreeMap<_, _>>()
            }),
            ..ConnectionTemplate::default()
        });
        descriptor
    }

    fn query_map(uri: &HandoffUri) -> BTreeMap<String, String> {
        Url::parse(uri.as_str())
            .unwrap()
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    #[test]
    fn missing_template_rejected() {
        let descriptor = IntegrationDescriptor::new("bare", "Bare");
        assert_eq!(build(&descriptor), Err(BuildError::MissingTemplate));
    }

    #[test]
    fn missing_transport_rejected() {
        let mut descriptor = IntegrationDescriptor::new("odd", "Odd");
        descriptor.template = Some(ConnectionTemplate::default());
        assert_eq!(
            build(&descriptor),
            Err(BuildError::MissingTransport {
                name: "Odd".to_string()
            })
        );
    }

    #[test]
    fn stdio_inferred_from_bare_command() {
        let mut descriptor = IntegrationDescriptor::new("legacy", "Legacy Tool");
        descriptor.template = Some(ConnectionTemplate {
            command: Some("legacy-tool".to_string()),
            ..ConnectionTemplate::default()
        });
        let built = build(&descriptor).unwrap();
        assert_eq!(query_map(&built.uri)["transport"], "stdio");
    }

    #[test]
    fn descriptor_hint_used_when_template_untagged() {
        let mut descriptor = IntegrationDescriptor::new("hinted", "Hinted");
        descriptor.transport = Some(TransportKind::Sse);
        descriptor.template = Some(ConnectionTemplate {
            url: Some("https://hinted.example.com/sse".to_string()),
            ..ConnectionTemplate::default()
        });
        let built = build(&descriptor).unwrap();
        assert_eq!(query_map(&built.uri)["transport"], "sse");
    }

    #[test]
    fn empty_command_rejected() {
        let descriptor = stdio_descriptor("   ", &[]);
        assert_eq!(build(&descriptor), Err(BuildError::MissingCommand));
    }

    #[test]
    fn denylisted_commands_rejected_case_insensitively() {
        for command in ["bash", "BASH", "Sudo", "curl", "/usr/bin/rm", "C:\\Windows\\cmd.exe"] {
            let descriptor = stdio_descriptor(command, &[]);
            assert!(
                matches!(build(&descriptor), Err(BuildError::BlockedCommand { .. })),
                "expected '{command}' to be blocked"
            );
        }
    }

    #[test]
    fn dangerous_arguments_rejected() {
        for arg in [
            "a && b",
            "x || y",
            "one;two",
            "pipe|me",
            "`id`",
            "$(whoami)",
            "out>file",
            "in<file",
            "../etc/passwd",
            "rm -rf /",
        ] {
            let descriptor = stdio_descriptor("my-tool", &[arg]);
            assert!(
                matches!(build(&descriptor), Err(BuildError::DangerousArgument { .. })),
                "expected '{arg}' to be rejected"
            );
        }
    }

    #[test]
    fn exec_flags_rejected() {
        for flag in ["-e", "--eval", "-c", "--command", "--call"] {
            let descriptor = stdio_descriptor("node", &[flag, "payload"]);
            assert_eq!(
                build(&descriptor),
                Err(BuildError::BlockedFlag {
                    flag: flag.to_string()
                })
            );
        }
    }

    #[test]
    fn rejection_names_the_offender() {
        let descriptor = stdio_descriptor("my-tool", &["ok", "$(whoami)"]);
        match build(&descriptor) {
            Err(BuildError::DangerousArgument { pattern, argument }) => {
                assert_eq!(pattern, "$(");
                assert_eq!(argument, "$(whoami)");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn valid_stdio_build_joins_args_with_commas() {
        let descriptor = stdio_descriptor("my-tool", &["--flag", "value"]);
        let built = build(&descriptor).unwrap();
        let query = query_map(&built.uri);
        assert_eq!(query["name"], "Weather");
        assert_eq!(query["transport"], "stdio");
        assert_eq!(query["command"], "my-tool");
        assert_eq!(query["args"], "--flag,value");
        assert!(built.warnings.is_empty());
    }

    #[test]
    fn env_vars_deferred_with_warning() {
        let mut descriptor = stdio_descriptor("my-tool", &[]);
        if let Some(template) = descriptor.template.as_mut() {
            template.env = Some(BTreeMap::from([(
                "API_KEY".to_string(),
                "secret".to_string(),
            )]));
        }
        let built = build(&descriptor).unwrap();
        assert_eq!(built.warnings.len(), 1);
        assert!(!built.uri.as_str().contains("secret"));
        assert!(!built.uri.as_str().contains("API_KEY"));
    }

    #[test]
    fn missing_url_rejected() {
        let descriptor = network_descriptor("  ", &[]);
        assert!(matches!(build(&descriptor), Err(BuildError::MissingUrl { .. })));
    }

    #[test]
    fn unsafe_headers_rejected() {
        for value in ["<script>alert(1)</script>", "<SCRIPT src=x>", "javascript:alert(1)"] {
            let descriptor =
                network_descriptor("https://issues.example.com/sse", &[("X-Injected", value)]);
            assert_eq!(
                build(&descriptor),
                Err(BuildError::UnsafeHeader {
                    name: "X-Injected".to_string()
                })
            );
        }
    }

    #[test]
    fn valid_network_build_serializes_headers_as_json() {
        let descriptor = network_descriptor(
            "https://issues.example.com/sse",
            &[("Authorization", "Bearer abc"), ("X-Team", "core")],
        );
        let built = build(&descriptor).unwrap();
        let query = query_map(&built.uri);
        assert_eq!(query["url"], "https://issues.example.com/sse");
        let headers: BTreeMap<String, String> = serde_json::from_str(&query["headers"]).unwrap();
        assert_eq!(headers["Authorization"], "Bearer abc");
        assert_eq!(headers["X-Team"], "core");
    }

    #[test]
    fn name_and_transport_lead_and_round_trip() {
        let mut descriptor = stdio_descriptor("my-tool", &[]);
        descriptor.name = "Weather & Climate".to_string();
        let built = build(&descriptor).unwrap();

        let parsed = Url::parse(built.uri.as_str()).unwrap();
        let pairs: Vec<(String, String)> = parsed
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(pairs[0], ("name".to_string(), "Weather & Climate".to_string()));
        assert_eq!(pairs[1], ("transport".to_string(), "stdio".to_string()));
    }

    #[test]
    fn build_is_deterministic() {
        let descriptor = network_descriptor(
            "https://issues.example.com/sse",
            &[("B-Header", "2"), ("A-Header", "1")],
        );
        let first = build(&descriptor).unwrap();
        let second = build(&descriptor).unwrap();
        assert_eq!(first.uri, second.uri);
    }

    #[test]
    fn oversized_link_rejected() {
        let long_arg = "x".repeat(MAX_URI_LENGTH);
        let descriptor = stdio_descriptor("my-tool", &[long_arg.as_str()]);
        assert!(matches!(build(&descriptor), Err(BuildError::UriTooLong { .. })));
    }

    #[test]
    fn scheme_prefix_always_present() {
        let descriptor = stdio_descriptor("my-tool", &["--flag"]);
        let built = build(&descriptor).unwrap();
        assert!(built.uri.as_str().starts_with(SCHEME_PREFIX));
    }

    #[test]
    fn skip_validation_bypasses_security_checks_only() {
        let options = BuildOptions {
            skip_validation: true,
        };

        // Security checks bypassed.
        let blocked = stdio_descriptor("bash", &["$(whoami)"]);
        assert!(build_with(&blocked, &options).is_ok());

        // Presence checks still enforced.
        let bare = IntegrationDescriptor::new("bare", "Bare");
        assert_eq!(
            build_with(&bare, &options),
            Err(BuildError::MissingTemplate)
        );
    }

    #[test]
    fn command_preview_renders_launch_line() {
        let descriptor = stdio_descriptor("weather-cli", &["--city", "Paris"]);
        assert_eq!(command_preview(&descriptor).unwrap(), "weather-cli --city Paris");

        let network = network_descriptor("https://issues.example.com/sse", &[]);
        assert_eq!(
            command_preview(&network).unwrap(),
            "https://issues.example.com/sse"
        );
    }
}
