use serde::{Deserialize, Serialize};

use awo_core::Candidate;

/// Majority outcome over a set of candidate texts.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Consensus {
    pub total_candidates: usize,
    pub voter_count: usize,
    pub voters: Vec<String>,
    pub consensus_norm: String,
    /// First original candidate text whose normalized form won.
    pub consensus_text: String,
    pub agreement_ratio: f64,
}

/// Trim, lowercase, collapse whitespace runs to a single space.
pub fn normalize(text: &str) -> String {
    text.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Groups candidates by normalized text and picks the largest group; ties go
/// to the longer normalized text, then to the group seen first.
///
/// Returns `None` only when there are no candidates. Lack of unanimity is
/// never a failure.
pub fn vote(candidates: &[Candidate]) -> Option<Consensus> {
    if candidates.is_empty() {
        return None;
    }

    // Buckets keep first-appearance order.
    let mut buckets: Vec<(String, Vec<String>)> = Vec::new();
    for c in candidates {
        let key = normalize(&c.text);
        match buckets.iter_mut().find(|(k, _)| *k == key) {
            Some((_, voters)) => voters.push(c.model.clone()),
            None => buckets.push((key, vec![c.model.clone()])),
        }
    }

    let mut winner = &buckets[0];
    for bucket in &buckets[1..] {
        let rank = (bucket.1.len(), bucket.0.chars().count());
        let best = (winner.1.len(), winner.0.chars().count());
        if rank > best {
            winner = bucket;
        }
    }
    let (consensus_norm, voters) = winner.clone();

    let consensus_text = candidates
        .iter()
        .find(|c| normalize(&c.text) == consensus_norm)
        .map(|c| c.text.clone())
        .unwrap_or_default();

    Some(Consensus {
        total_candidates: candidates.len(),
        voter_count: voters.len(),
        agreement_ratio: voters.len() as f64 / candidates.len() as f64,
        voters,
        consensus_norm,
        consensus_text,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fanout() -> Vec<Candidate> {
        vec![
            Candidate::new("echo", "Hi there"),
            Candidate::new("upper", "HI THERE"),
            Candidate::new("reverse", "ereht iH"),
        ]
    }

    #[test]
    fn majority_bucket_wins() {
        let c = vote(&fanout()).unwrap();
        assert_eq!(c.consensus_norm, "hi there");
        assert_eq!(c.voters, vec!["echo".to_string(), "upper".to_string()]);
        assert_eq!(c.voter_count, 2);
        assert_eq!(c.total_candidates, 3);
        assert!((c.agreement_ratio - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(c.consensus_text, "Hi there");
    }

    #[test]
    fn representative_is_first_matching_original() {
        let mut cands = fanout();
        cands.swap(0, 1);
        let c = vote(&cands).unwrap();
        assert_eq!(c.consensus_text, "HI THERE");
        assert_eq!(c.voters, vec!["upper".to_string(), "echo".to_string()]);
    }

    #[test]
    fn tie_on_size_prefers_longer_text() {
        let cands = vec![Candidate::new("a", "short"), Candidate::new("b", "a longer answer")];
        let c = vote(&cands).unwrap();
        assert_eq!(c.consensus_text, "a longer answer");
        assert_eq!(c.agreement_ratio, 0.5);
    }

    #[test]
    fn full_tie_prefers_first_seen() {
        let cands = vec![Candidate::new("a", "abc"), Candidate::new("b", "xyz")];
        assert_eq!(vote(&cands).unwrap().voters, vec!["a".to_string()]);
    }

    #[test]
    fn whitespace_runs_collapse() {
        assert_eq!(normalize("  Hello \n\t World  "), "hello world");
    }

    #[test]
    fn empty_input_has_no_consensus() {
        assert!(vote(&[]).is_none());
    }

    #[test]
    fn serializes_field_names_used_by_downstream_steps() {
        let v = serde_json::to_value(vote(&fanout()).unwrap()).unwrap();
        assert_eq!(v["consensus_text"], "Hi there");
        assert_eq!(v["voters"][1], "upper");
    }
}
