// Verdict Classifier
// Pure decision table over (ai_probability, plagiarism_score); first matching row wins.

use crate::models::Verdict;

const AI_HIGH: f64 = 0.7;
const AI_REVIEW: f64 = 0.4;
const PLAGIARISM_HIGH: f64 = 0.3;
const PLAGIARISM_REVIEW: f64 = 0.1;

pub fn classify(ai_probability: f64, plagiarism_score: f64) -> Verdict {
    let ai_high = ai_probability > AI_HIGH;
    let plagiarism_high = plagiarism_score > PLAGIARISM_HIGH;

    if ai_high && plagiarism_high {
        Verdict::AiWithPlagiarism
    } else if ai_high {
        Verdict::LikelyAi
    } else if plagiarism_high {
        Verdict::Plagiarism
    } else if ai_probability > AI_REVIEW || plagiarism_score > PLAGIARISM_REVIEW {
        Verdict::NeedsReview
    } else {
        Verdict::Original
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_order() {
        assert_eq!(classify(0.8, 0.5), Verdict::AiWithPlagiarism);
        assert_eq!(classify(0.8, 0.5).label(), "High AI probability with significant plagiarism detected");
        assert_eq!(classify(0.8, 0.2), Verdict::LikelyAi);
        assert_eq!(classify(0.2, 0.5), Verdict::Plagiarism);
        assert_eq!(classify(0.5, 0.0), Verdict::NeedsReview);
        assert_eq!(classify(0.0, 0.15), Verdict::NeedsReview);
        assert_eq!(classify(0.0, 0.0), Verdict::Original);
    }

    #[test]
    fn test_thresholds_are_strict() {
        assert_eq!(classify(0.7, 0.3), Verdict::NeedsReview);
        assert_eq!(classify(0.4, 0.1), Verdict::Original);
        assert_eq!(classify(0.71, 0.3), Verdict::LikelyAi);
        assert_eq!(classify(0.7, 0.31), Verdict::Plagiarism);
    }

    #[test]
    fn test_is_pure() {
        for &(ai, plag) in &[(0.1, 0.9), (0.75, 0.05), (0.45, 0.2), (0.0, 0.0)] {
            assert_eq!(classify(ai, plag), classify(ai, plag));
        }
    }
}
