//! Fixed safety messages returned by the response policy.
//!
//! These strings are part of the output contract with the narrative/UI
//! collaborator: hotline numbers are literal output whenever severity is
//! critical. None of the text here may contain phrasing that re-triggers the
//! phrase or pattern rules (filtering must be idempotent).

/// Crisis-resource message returned for critical user input.
///
/// The whole input is replaced with this message; critical input is never
/// partially echoed back into the narrative context.
pub fn crisis_message() -> String {
    "I notice your message contains content about serious safety concerns. \
     Please know that support is available and you don't have to face these feelings alone.\n\n\
     **Immediate Support:**\n\
     - National Care Hotline (Singapore): 1800-202-6868 (24 hours)\n\
     - Samaritans of Singapore (SOS): 1-767 (24 hours)\n\
     - Emergency: 999\n\n\
     In SootheAI, let's explore healthier ways Serena might cope with difficult feelings."
        .to_string()
}

/// Safe-alternative redirect for non-critical violations.
///
/// Offers constructive directions instead of the flagged content. The
/// `context` is the flagged text; academic or family themes in it add a
/// targeted suggestion.
pub fn safe_alternative(context: &str) -> String {
    let mut response = String::from(
        "I notice this conversation is headed in a potentially sensitive direction. \
         As Serena's story explores academic pressure and stress, it's important to focus on \
         healthy coping strategies and seeking support when needed.\n\n\
         Let's explore more constructive approaches to the challenges Serena faces. \
         Would you like to:\n\n\
         1. Learn about healthy stress management techniques\n\
         2. Explore how Serena might talk to a trusted friend or teacher\n\
         3. Consider how Serena could balance academic goals with self-care\n\
         4. Continue the story in a different direction",
    );

    let lower = context.to_lowercase();
    if lower.contains("academic") || lower.contains("exam") {
        response.push_str("\n5. Discuss study techniques that reduce worry");
    } else if lower.contains("parent") || lower.contains("family") {
        response.push_str("\n5. Explore healthy family communication strategies");
    }

    response.push_str("\n\n");
    response.push_str(&safety_disclaimer());
    response
}

/// Standard safety disclaimer appended to filtered responses when any match
/// is high severity or above.
pub fn safety_disclaimer() -> String {
    "**Safety Notice:** If you're feeling overwhelmed, remember that professional support \
     is available. Reach out to a trusted adult, school counselor, or contact a helpline \
     like the National Care Hotline (1800-202-6868) or Samaritans of Singapore (1-767)."
        .to_string()
}
