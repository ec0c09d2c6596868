//! Deterministic naming of child objects.
//!
//! Every child object name is a pure function of the owning InferenceService
//! name, so repeated reconciliation always converges on the same objects.
//! Truncation keeps the *suffix* of the original name; overlapping prefixes
//! are common (`team-a-llama-7b`, `team-a-llama-13b`) and a suffix keeps them
//! distinct.

use regex::Regex;
use sha2::{Digest, Sha256};

use crate::constants::Component;

/// Last `n` characters of a name.
fn last_chars(s: &str, n: usize) -> &str {
    if s.len() <= n {
        s
    } else {
        &s[s.len() - n..]
    }
}

/// Child workload/service name for a component: `<isvc>-engine` etc.
pub fn child_name(isvc: &str, component: Component) -> String {
    format!("{}-{}", isvc, component.as_str())
}

/// Per-service model config map, keyed on the last 20 characters.
pub fn modelconfig_name(isvc: &str) -> String {
    format!("modelconfig-{}", last_chars(isvc, 20))
}

/// Leader-worker set name, keyed on the last 50 characters.
pub fn lws_name(isvc: &str) -> String {
    format!("lws-{}", last_chars(isvc, 50))
}

/// Persistent volume (claim) name for a download job.
///
/// Concatenates truncated namespace, model and job names. Short namespaces
/// pass through unchanged; long ones keep their suffix.
pub fn pv_name(namespace: &str, model: &str, job: &str) -> String {
    format!(
        "{}-{}-{}",
        last_chars(namespace, 16),
        last_chars(model, 25),
        last_chars(job, 16)
    )
}

/// Bounds a derived name to `limit` characters.
///
/// Names within budget pass through untouched. Over-budget names are rewritten
/// as `<hash8>-<suffix>`: the first 8 hex characters of the SHA-256 of the
/// original, then as much of the original's suffix as fits. DNS labels must
/// start with a letter, so a digit-led hash has its first character re-led
/// into `a`..`j`.
pub fn truncate_name(name: &str, limit: usize) -> String {
    if name.len() <= limit {
        return name.to_string();
    }
    debug!("truncating {} to fit {} characters", name, limit);
    let digest = Sha256::digest(name.as_bytes());
    let mut hash8 = hex::encode(&digest[..4]);
    if let Some(first) = hash8.chars().next() {
        if first.is_ascii_digit() {
            let letter = (b'a' + (first as u8 - b'0')) as char;
            hash8.replace_range(..1, &letter.to_string());
        }
    }
    let budget = limit.saturating_sub(hash8.len() + 1);
    format!("{}-{}", hash8, last_chars(name, budget))
}

/// ECMAScript regex matching a virtual host.
///
/// For a cluster-local host `svc.ns.svc.<clusterDomain>` the regex accepts the
/// full host and its shorter prefixes (`svc.ns`, `svc.ns.svc`), each with an
/// optional `:<port>` of 1-5 digits. Non-local hosts accept only
/// `host[:port]`.
pub fn host_regex(host: &str, cluster_domain: &str) -> String {
    let local_suffix = format!(".svc.{}", cluster_domain);
    if let Some(stripped) = host.strip_suffix(&local_suffix) {
        format!(
            "^{}(\\.svc(\\.{})?)?(:[0-9]{{1,5}})?$",
            regex::escape(stripped),
            regex::escape(cluster_domain)
        )
    } else {
        format!("^{}(:[0-9]{{1,5}})?$", regex::escape(host))
    }
}

/// Validation regex for InferenceService names.
pub fn name_pattern() -> Regex {
    Regex::new(r"^[a-z]([-a-z0-9]*[a-z0-9])?$").unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::MAX_LABEL_LENGTH;

    #[test]
    fn child_names_are_suffixed() {
        assert_eq!(child_name("svc", Component::Engine), "svc-engine");
        assert_eq!(child_name("svc", Component::Decoder), "svc-decoder");
        assert_eq!(child_name("svc", Component::Router), "svc-router");
    }

    #[test]
    fn modelconfig_keeps_last_twenty() {
        assert_eq!(modelconfig_name("svc"), "modelconfig-svc");
        let long = "a".repeat(60);
        let name = modelconfig_name(&long);
        assert_eq!(name, format!("modelconfig-{}", "a".repeat(20)));
        // overlapping prefixes stay distinct
        let a = modelconfig_name("shared-prefix-service-alpha");
        let b = modelconfig_name("shared-prefix-service-beta");
        assert_ne!(a, b);
    }

    #[test]
    fn lws_keeps_last_fifty() {
        assert_eq!(lws_name("svc"), "lws-svc");
        let long = "x".repeat(80);
        assert_eq!(lws_name(&long), format!("lws-{}", "x".repeat(50)));
    }

    #[test]
    fn pv_name_truncates_each_part() {
        assert_eq!(pv_name("ns", "llama", "job"), "ns-llama-job");
        let name = pv_name(
            &"n".repeat(40),
            &"m".repeat(40),
            &"j".repeat(40),
        );
        assert_eq!(name.len(), 16 + 1 + 25 + 1 + 16);
    }

    #[test]
    fn truncation_is_deterministic_and_bounded() {
        let long = format!("very-long-inference-service-{}", "z".repeat(80));
        let once = truncate_name(&long, MAX_LABEL_LENGTH);
        let twice = truncate_name(&long, MAX_LABEL_LENGTH);
        assert_eq!(once, twice);
        assert_eq!(once.len(), MAX_LABEL_LENGTH);
    }

    #[test]
    fn truncation_triggers_past_limit() {
        let long = "a".repeat(50);
        let kept = truncate_name(&long, MAX_LABEL_LENGTH);
        assert_eq!(kept, long);

        let truncated = truncate_name(&long, 49);
        assert_eq!(truncated.len(), 49);
        assert_eq!(&truncated[8..9], "-");
        assert!(truncated.ends_with(&"a".repeat(40)));
        let first = truncated.chars().next().unwrap();
        assert!(first.is_ascii_lowercase(), "must start with a letter: {}", truncated);
    }

    #[test]
    fn truncation_keeps_distinct_names_distinct() {
        let a = truncate_name(&format!("{}-one", "p".repeat(80)), MAX_LABEL_LENGTH);
        let b = truncate_name(&format!("{}-two", "p".repeat(80)), MAX_LABEL_LENGTH);
        assert_ne!(a, b);
        // same suffix, different prefix: the hash keeps them apart
        let c = truncate_name(&format!("alpha-{}", "s".repeat(80)), MAX_LABEL_LENGTH);
        let d = truncate_name(&format!("omega-{}", "s".repeat(80)), MAX_LABEL_LENGTH);
        assert_ne!(c, d);
    }

    #[test]
    fn host_regex_matches_local_prefixes() {
        let re = Regex::new(&host_regex("svc.ns.svc.cluster.local", "cluster.local")).unwrap();
        assert!(re.is_match("svc.ns"));
        assert!(re.is_match("svc.ns.svc"));
        assert!(re.is_match("svc.ns.svc.cluster.local"));
        assert!(re.is_match("svc.ns:8080"));
        assert!(re.is_match("svc.ns.svc.cluster.local:80"));
        assert!(!re.is_match("svc.other"));
        assert!(!re.is_match("svc.ns.svc.cluster.local:123456"));
        assert!(!re.is_match("prefix-svc.ns"));
    }

    #[test]
    fn host_regex_external_is_exact() {
        let re = Regex::new(&host_regex("models.example.com", "cluster.local")).unwrap();
        assert!(re.is_match("models.example.com"));
        assert!(re.is_match("models.example.com:443"));
        assert!(!re.is_match("models.example.com.evil.com"));
        assert!(!re.is_match("models.example"));
    }

    #[test]
    fn name_pattern_accepts_dns_names() {
        let re = name_pattern();
        assert!(re.is_match("svc"));
        assert!(re.is_match("llama-7b"));
        assert!(re.is_match("a"));
        assert!(!re.is_match("Svc"));
        assert!(!re.is_match("-svc"));
        assert!(!re.is_match("svc-"));
        assert!(!re.is_match("7svc"));
    }
}
