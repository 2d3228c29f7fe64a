use skywatch_common::InterlocutorProfile;

use crate::topics::extract_topics;

pub const INTERLOCUTOR_SCORE_MAX: f64 = 40.0;

/// Weighted additive heuristic over a participant's public profile, clamped
/// to [0,40]. Pure — no network, no side effects. The reason strings feed
/// the monitoring briefing.
pub fn score_interlocutor(
    profile: &InterlocutorProfile,
    vocabulary: &[String],
) -> (f64, Vec<String>) {
    let mut score: f64 = 0.0;
    let mut reasons = Vec::new();

    if profile.followers_count >= 10_000 {
        score += 15.0;
        reasons.push("10k+ followers".to_string());
    } else if profile.followers_count >= 1_000 {
        score += 10.0;
        reasons.push("1k+ followers".to_string());
    } else if profile.followers_count >= 100 {
        score += 5.0;
        reasons.push("100+ followers".to_string());
    }

    // follows == 0 reads as maximal authority rather than a division crash
    let ratio = profile.followers_count as f64 / profile.follows_count.max(1) as f64;
    if ratio >= 5.0 {
        score += 10.0;
        reasons.push(format!("authority ratio {ratio:.1}"));
    } else if ratio >= 2.0 {
        score += 5.0;
        reasons.push(format!("authority ratio {ratio:.1}"));
    }

    if profile.posts_count >= 1_000 {
        score += 5.0;
        reasons.push("prolific poster".to_string());
    } else if profile.posts_count >= 100 {
        score += 3.0;
        reasons.push("active poster".to_string());
    }

    let bio_matches = profile
        .description
        .as_deref()
        .map(|bio| extract_topics(bio, vocabulary).len())
        .unwrap_or(0);
    if bio_matches >= 3 {
        score += 10.0;
        reasons.push(format!("bio on-topic ({bio_matches} matches)"));
    } else if bio_matches >= 1 {
        score += 5.0;
        reasons.push(format!("bio on-topic ({bio_matches} match)"));
    }

    (score.clamp(0.0, INTERLOCUTOR_SCORE_MAX), reasons)
}
