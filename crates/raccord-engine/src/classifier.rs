use raccord_contracts::defects::{Decision, DopError, ErrorClassification};
use raccord_contracts::vocabulary::Vocabulary;

/// An allow-listed type is always fixable. Any other defect is fixable
/// unless its type carries an identity marker or its description names an
/// identity/face mismatch.
pub fn is_fixable(error: &DopError, vocabulary: &Vocabulary) -> bool {
    if vocabulary.is_fixable_type(&error.error_type) {
        return true;
    }
    !vocabulary.has_identity_marker(&error.error_type)
        && !vocabulary.has_unfixable_term(&error.description)
}

/// Partitions defects and derives the base decision.
///
/// Any unfixable defect means `skip`: re-prompting cannot repair identity,
/// so retrying only burns credits. No defects at all is also `skip`.
pub fn classify_errors(errors: &[DopError], vocabulary: &Vocabulary) -> ErrorClassification {
    let (fixable, unfixable): (Vec<DopError>, Vec<DopError>) = errors
        .iter()
        .cloned()
        .partition(|error| is_fixable(error, vocabulary));

    let decision = if !unfixable.is_empty() {
        Decision::Skip
    } else if !fixable.is_empty() {
        Decision::Retry
    } else {
        Decision::Skip
    };

    ErrorClassification {
        fixable,
        unfixable,
        decision,
    }
}
