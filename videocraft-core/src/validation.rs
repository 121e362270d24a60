//! Media-URL validator (§4.1, C1).
//!
//! Applies the five rejection rules in order, first failure wins, and never
//! rewrites input. Rejections are logged with structured fields
//! (`tracing::error!` with key-value fields) rather than a formatted
//! string, so they stay greppable.

use crate::error::CoreError;
use crate::types::{Element, VideoProject};
use tracing::error;
use url::Url;

const DISALLOWED_SCHEMES: &[&str] = &["data:", "javascript:", "vbscript:", "file:", "ftp:"];
const INJECTION_CHARS: &[char] = &[';', '|', '`', '$', '(', ')', '{', '}'];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Violation {
    DisallowedScheme,
    InjectionChar,
    PathTraversal,
    UnparseableOrBadScheme,
    DomainNotAllowed,
}

impl Violation {
    fn into_error(self) -> CoreError {
        match self {
            Violation::DomainNotAllowed => CoreError::DomainNotAllowed,
            other => CoreError::InvalidUrl(format!("{other:?}")),
        }
    }
}

/// Validate a single URL against §4.1 rules 1-5. `domain_allowlist` empty
/// means rule 5 is skipped.
pub fn validate(url: &str, domain_allowlist: &[String]) -> Result<(), CoreError> {
    validate_with_path(url, domain_allowlist, None)
}

/// Validate every element source URL in a project, short-circuiting on the
/// first failure and reporting the failing element's path for diagnostics.
/// Also enforces the §3 structural invariant ("exactly one `video` element
/// required at project scope, at least one `audio` element") before any URL
/// is checked, so a structurally-invalid project is rejected synchronously
/// rather than failing later inside the pipeline.
pub fn validate_config(
    project: &VideoProject,
    domain_allowlist: &[String],
) -> Result<(), CoreError> {
    validate_structure(project)?;

    for (si, scene) in project.scenes.iter().enumerate() {
        for (ei, element) in scene.elements.iter().enumerate() {
            if let Some(src) = element_src(element) {
                let path = format!("scenes[{si}].elements[{ei}]");
                validate_with_path(src, domain_allowlist, Some(&path))?;
            }
        }
    }
    for (ei, element) in project.elements.iter().enumerate() {
        if let Some(src) = element_src(element) {
            let path = format!("elements[{ei}]");
            validate_with_path(src, domain_allowlist, Some(&path))?;
        }
    }
    Ok(())
}

/// §3: "`video` (the background; exactly one required at project scope),
/// `audio` (one or more, ordered; defines scene timing)".
fn validate_structure(project: &VideoProject) -> Result<(), CoreError> {
    let video_count = project
        .elements
        .iter()
        .filter(|e| matches!(e, Element::Video { .. }))
        .count();
    if video_count != 1 {
        return Err(CoreError::InvalidInput(format!(
            "project must have exactly one project-scoped video element, found {video_count}"
        )));
    }

    let audio_count = project
        .scenes
        .iter()
        .flat_map(|scene| scene.elements.iter())
        .filter(|e| matches!(e, Element::Audio { .. }))
        .count();
    if audio_count == 0 {
        return Err(CoreError::InvalidInput(
            "project must have at least one audio element".to_string(),
        ));
    }

    Ok(())
}

fn element_src(element: &Element) -> Option<&str> {
    match element {
        Element::Video { src, .. } | Element::Audio { src, .. } | Element::Image { src, .. } => {
            Some(src.as_str())
        }
        Element::Subtitles { .. } => None,
    }
}

fn validate_with_path(
    url: &str,
    domain_allowlist: &[String],
    element_path: Option<&str>,
) -> Result<(), CoreError> {
    match check(url, domain_allowlist) {
        Ok(()) => Ok(()),
        Err(violation) => {
            error!(
                url = %redact(url),
                violation_type = ?violation,
                element_path = element_path.unwrap_or("<none>"),
                "rejected media url"
            );
            Err(violation.into_error())
        }
    }
}

fn check(url: &str, domain_allowlist: &[String]) -> Result<(), Violation> {
    let lower = url.to_ascii_lowercase();

    // Rule 1: disallowed schemes, case-insensitive.
    if DISALLOWED_SCHEMES.iter().any(|s| lower.starts_with(s)) {
        return Err(Violation::DisallowedScheme);
    }

    // Rule 2: shell metacharacters.
    if url.chars().any(|c| INJECTION_CHARS.contains(&c)) {
        return Err(Violation::InjectionChar);
    }

    // Rule 3: path traversal substrings.
    if url.contains("../") || url.contains("..\\") {
        return Err(Violation::PathTraversal);
    }

    // Rule 4: must parse as http(s).
    let parsed = Url::parse(url).map_err(|_| Violation::UnparseableOrBadScheme)?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(Violation::UnparseableOrBadScheme);
    }

    // Rule 5: domain allowlist, only enforced when non-empty.
    if !domain_allowlist.is_empty() {
        let host = parsed.host_str().ok_or(Violation::DomainNotAllowed)?;
        if !domain_allowlist.iter().any(|d| d == host) {
            return Err(Violation::DomainNotAllowed);
        }
    }

    Ok(())
}

/// URLs are logged verbatim per §4.1 ("logged with fields `{url, ...}`"),
/// but we still avoid echoing credentials embedded in the authority.
fn redact(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) if !parsed.username().is_empty() || parsed.password().is_some() => {
            let _ = parsed.set_username("");
            let _ = parsed.set_password(None);
            parsed.to_string()
        }
        _ => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Scene;

    #[test]
    fn rejects_javascript_scheme() {
        let err = validate("javascript:alert(1)", &[]).unwrap_err();
        assert_eq!(err.code(), "invalid_url");
    }

    #[test]
    fn rejects_injection_characters() {
        let err = validate("https://h/a.mp3; rm -rf /", &[]).unwrap_err();
        assert_eq!(err.code(), "invalid_url");
    }

    #[test]
    fn rejects_path_traversal() {
        let err = validate("https://h/../../etc/passwd", &[]).unwrap_err();
        assert_eq!(err.code(), "invalid_url");
    }

    #[test]
    fn rejects_non_http_scheme() {
        let err = validate("ftp://h/a.mp3", &[]).unwrap_err();
        assert_eq!(err.code(), "invalid_url");
    }

    #[test]
    fn accepts_plain_https() {
        assert!(validate("https://h.example/a.mp3", &[]).is_ok());
    }

    #[test]
    fn enforces_allowlist_when_configured() {
        let allow = vec!["trusted.example".to_string()];
        assert!(validate("https://trusted.example/a.mp3", &allow).is_ok());
        let err = validate("https://untrusted.example/a.mp3", &allow).unwrap_err();
        assert_eq!(err.code(), "domain_not_allowed");
    }

    #[test]
    fn order_of_rules_injection_before_scheme_parse() {
        // Would also fail URL parsing, but injection-char rule fires first.
        let err = validate("not a url; rm -rf /", &[]).unwrap_err();
        assert_eq!(err.code(), "invalid_url");
    }

    fn project(elements: Vec<Element>, scenes: Vec<Scene>) -> VideoProject {
        VideoProject {
            scenes,
            elements,
            quality: crate::types::Quality::Standard,
            resolution: None,
        }
    }

    #[test]
    fn rejects_project_with_no_background_video() {
        let project = project(
            vec![],
            vec![Scene {
                elements: vec![Element::Audio {
                    src: "https://h/a.mp3".to_string(),
                    duration: 0.0,
                    language: "en".to_string(),
                }],
            }],
        );
        let err = validate_config(&project, &[]).unwrap_err();
        assert_eq!(err.code(), "invalid_input");
    }

    #[test]
    fn rejects_project_with_more_than_one_background_video() {
        let video = Element::Video {
            src: "https://h/bg.mp4".to_string(),
            duration: 10.0,
        };
        let project = project(
            vec![video.clone(), video],
            vec![Scene {
                elements: vec![Element::Audio {
                    src: "https://h/a.mp3".to_string(),
                    duration: 0.0,
                    language: "en".to_string(),
                }],
            }],
        );
        let err = validate_config(&project, &[]).unwrap_err();
        assert_eq!(err.code(), "invalid_input");
    }

    #[test]
    fn rejects_project_with_no_audio() {
        let project = project(
            vec![Element::Video {
                src: "https://h/bg.mp4".to_string(),
                duration: 10.0,
            }],
            vec![],
        );
        let err = validate_config(&project, &[]).unwrap_err();
        assert_eq!(err.code(), "invalid_input");
    }

    #[test]
    fn accepts_structurally_valid_project() {
        let project = project(
            vec![Element::Video {
                src: "https://h/bg.mp4".to_string(),
                duration: 10.0,
            }],
            vec![Scene {
                elements: vec![Element::Audio {
                    src: "https://h/a.mp3".to_string(),
                    duration: 0.0,
                    language: "en".to_string(),
                }],
            }],
        );
        assert!(validate_config(&project, &[]).is_ok());
    }
}
