//! Config validation: unknown-key detection with Levenshtein suggestions
//! and range checks.
//!
//! Two-pass parse approach: first deserialize raw TOML into `toml::Value`,
//! walk the key tree, compare against known field names, and emit warnings
//! with "did you mean?" suggestions. Then proceed with normal serde
//! deserialization and range validation.

use std::collections::HashSet;

use super::AnalyzerConfig;

/// A non-fatal config warning (typo, unknown section).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, "; did you mean '{s}'?")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

/// Returns the complete set of valid dotted key paths for AnalyzerConfig.
///
/// Any new field added to AnalyzerConfig must be added here too.
pub fn known_config_keys() -> HashSet<&'static str> {
    let keys: &[&str] = &[
        // [acquisition]
        "acquisition",
        "acquisition.port",
        "acquisition.baud_rate",
        "acquisition.read_timeout_ms",
        "acquisition.idle_poll_ms",
        "acquisition.spike_reject_threshold",
        // [live]
        "live",
        "live.sample_rate",
        "live.window_size",
        "live.fft_size",
        "live.recompute_cadence",
        "live.live_peak_threshold",
        // [peaks]
        "peaks",
        "peaks.smoothing_window_length",
        "peaks.smoothing_polyorder",
        "peaks.noise_freq_cutoff",
        "peaks.peak_count",
        // [batch]
        "batch",
        "batch.resample_points",
        "batch.resample_mode",
        "batch.jitter_tolerance",
    ];
    keys.iter().copied().collect()
}

/// Collect every dotted key path in a TOML value tree.
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(table) = value.as_table() {
        for (k, v) in table {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            keys.push(path.clone());
            if v.is_table() {
                keys.extend(walk_toml_keys(v, &path));
            }
        }
    }
    keys
}

// ============================================================================
// Levenshtein Distance
// ============================================================================

/// Compute the Levenshtein edit distance between two strings.
fn levenshtein(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b_chars.len();
    }
    if b_chars.is_empty() {
        return a.chars().count();
    }

    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr = vec![0; b_chars.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, &cb) in b_chars.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b_chars.len()]
}

/// Suggest the closest known key for an unknown key, if within edit distance 3.
///
/// Ties resolve to the lexicographically smallest key so output is stable.
pub fn suggest_correction(unknown: &str, known: &HashSet<&str>) -> Option<String> {
    let mut best: Option<(&str, usize)> = None;
    for &k in known {
        let dist = levenshtein(unknown, k);
        if dist > 3 {
            continue;
        }
        best = match best {
            Some((bk, bd)) if bd < dist || (bd == dist && bk < k) => Some((bk, bd)),
            _ => Some((k, dist)),
        };
    }
    best.map(|(k, _)| k.to_string())
}

// ============================================================================
// Unknown Key Validation (entry point)
// ============================================================================

/// Parse a raw TOML string and return warnings for any unknown config keys.
///
/// This does NOT fail on unknown keys, it only warns.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let value: toml::Value = match raw_toml.parse() {
        Ok(v) => v,
        Err(_) => return Vec::new(), // parse errors are handled by serde later
    };

    let known = known_config_keys();
    walk_toml_keys(&value, "")
        .into_iter()
        .filter(|key| !known.contains(key.as_str()))
        .map(|key| {
            let suggestion = suggest_correction(&key, &known);
            ValidationWarning {
                message: format!("Unknown config key '{key}'"),
                field: key,
                suggestion,
            }
        })
        .collect()
}

// ============================================================================
// Range Validation
// ============================================================================

/// Validate value ranges and cross-field constraints on a parsed config.
///
/// Returns one message per violation; empty means valid.
/// Smoothing window vs. spectrum length is checked at the point of use,
/// since the batch spectrum length is only known after a session.
pub fn validate_ranges(cfg: &AnalyzerConfig) -> Vec<String> {
    let mut errors = Vec::new();

    let a = &cfg.acquisition;
    if !(a.spike_reject_threshold.is_finite() && a.spike_reject_threshold > 0.0) {
        errors.push(format!(
            "acquisition.spike_reject_threshold ({}) must be a positive finite number",
            a.spike_reject_threshold
        ));
    }
    if a.baud_rate == 0 {
        errors.push("acquisition.baud_rate must be > 0".to_string());
    }

    let l = &cfg.live;
    if !(l.sample_rate.is_finite() && l.sample_rate > 0.0) {
        errors.push(format!(
            "live.sample_rate ({}) must be a positive finite number",
            l.sample_rate
        ));
    }
    if l.window_size == 0 {
        errors.push("live.window_size must be > 0".to_string());
    }
    if l.fft_size < 2 {
        errors.push(format!("live.fft_size ({}) must be >= 2", l.fft_size));
    }
    if l.recompute_cadence == 0 {
        errors.push("live.recompute_cadence must be >= 1".to_string());
    }
    if let Some(t) = l.live_peak_threshold {
        if !t.is_finite() || t < 0.0 {
            errors.push(format!(
                "live.live_peak_threshold ({t}) must be a non-negative finite number"
            ));
        }
    }

    let p = &cfg.peaks;
    if p.smoothing_window_length % 2 == 0 {
        errors.push(format!(
            "peaks.smoothing_window_length ({}) must be odd",
            p.smoothing_window_length
        ));
    }
    if p.smoothing_polyorder >= p.smoothing_window_length {
        errors.push(format!(
            "peaks.smoothing_polyorder ({}) must be less than smoothing_window_length ({})",
            p.smoothing_polyorder, p.smoothing_window_length
        ));
    }
    if !p.noise_freq_cutoff.is_finite() || p.noise_freq_cutoff < 0.0 {
        errors.push(format!(
            "peaks.noise_freq_cutoff ({}) must be a non-negative finite number",
            p.noise_freq_cutoff
        ));
    }
    if p.peak_count == 0 {
        errors.push("peaks.peak_count must be >= 1".to_string());
    }

    let b = &cfg.batch;
    if b.resample_points < 2 {
        errors.push(format!(
            "batch.resample_points ({}) must be >= 2",
            b.resample_points
        ));
    }
    if !b.jitter_tolerance.is_finite() || b.jitter_tolerance < 0.0 {
        errors.push(format!(
            "batch.jitter_tolerance ({}) must be a non-negative finite number",
            b.jitter_tolerance
        ));
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levenshtein_identical() {
        assert_eq!(levenshtein("hello", "hello"), 0);
    }

    #[test]
    fn test_levenshtein_one_edit() {
        assert_eq!(levenshtein("fft_sise", "fft_size"), 1);
    }

    #[test]
    fn test_levenshtein_empty() {
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("abc", ""), 3);
    }

    #[test]
    fn test_walk_toml_keys_nested() {
        let toml: toml::Value = r#"
            [live]
            fft_size = 100
        "#
        .parse()
        .unwrap();
        let keys = walk_toml_keys(&toml, "");
        assert!(keys.contains(&"live".to_string()));
        assert!(keys.contains(&"live.fft_size".to_string()));
    }

    #[test]
    fn test_typo_suggests_known_key() {
        let warnings = validate_unknown_keys(
            r#"
[peaks]
peak_cont = 4
"#,
        );
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].field, "peaks.peak_cont");
        assert_eq!(warnings[0].suggestion.as_deref(), Some("peaks.peak_count"));
    }

    #[test]
    fn test_unrelated_key_has_no_suggestion() {
        let warnings = validate_unknown_keys("[dashboard]\ntheme = \"dark\"\n");
        assert_eq!(warnings.len(), 2);
        assert!(warnings.iter().all(|w| w.suggestion.is_none()));
    }

    #[test]
    fn test_default_config_has_no_range_errors() {
        assert!(validate_ranges(&AnalyzerConfig::default()).is_empty());
    }

    #[test]
    fn test_range_errors_are_collected() {
        let mut cfg = AnalyzerConfig::default();
        cfg.live.recompute_cadence = 0;
        cfg.peaks.smoothing_window_length = 3;
        cfg.peaks.smoothing_polyorder = 3;
        cfg.batch.resample_points = 1;
        let errors = validate_ranges(&cfg);
        assert_eq!(errors.len(), 3);
    }
}
