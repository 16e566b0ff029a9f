//! Prompt templates for concept synthesis, pose synthesis and verification.

use crate::character::CharacterSpec;
use crate::poses::PoseDescriptor;

/// Chroma-key background every image is drawn on.
pub const CHROMA_KEY: &str = "#00ff00";

/// Instruction for the one-shot concept image.
pub fn concept_prompt(spec: &CharacterSpec) -> String {
    format!(
        "You are a professional pixel art character designer.\n\
         \n\
         TASK 1: ANALYZE the visual style of the provided reference image. Note the proportions \
         (e.g. chibi, realistic), shading technique, color palette, and outline style.\n\
         \n\
         TASK 2: GENERATE A NEW CHARACTER that perfectly matches that analyzed style.\n\
         \n\
         New Character Details:\n\
         - Gender: {gender}\n\
         - Race: {race}\n\
         - Class: {class}\n\
         - Equipment: Wearing {armor} armor and holding a {weapon}.\n\
         - Aesthetic: Cute Cartoon/Anime Pixel Art (Vibrant colors, clear design).\n\
         \n\
         Output Requirements:\n\
         - Pose: Neutral standing pose, full body visible.\n\
         - Background: Solid green {CHROMA_KEY} (CRITICAL).\n\
         - Quality: High definition pixel art.",
        gender = spec.gender,
        race = spec.race,
        class = spec.class,
        armor = spec.armor,
        weapon = spec.weapon,
    )
}

/// Instruction for one pose attempt. `attempt` is 1-based; later attempts
/// carry a corrective note.
pub fn pose_prompt(spec: &CharacterSpec, pose: &PoseDescriptor, attempt: u32) -> String {
    let mut prompt = format!(
        "Retro 16-bit pixel art game sprite asset on a solid green {CHROMA_KEY} background.\n\
         The character is centered and maintains a strict, consistent scale and \"five-short\" body \
         proportion (approximately 3 heads tall) relative to the canvas boundaries across all \
         variations, occupying roughly 70% of the total vertical height regardless of the pose.\n\
         \n\
         Character Description: {description}.\n\
         \n\
         Reference Image: A character concept art.\n\
         TASK: Generate a pixel art sprite of the EXACT SAME character from the reference image in \
         the specified view.\n\
         VIEW: {suffix}.\n\
         \n\
         REQUIREMENTS:\n\
         1. Same character features and colors as reference.\n\
         2. STRICT 3-head tall proportion (\"five-short\" style).\n\
         3. Solid green {CHROMA_KEY} background.",
        description = spec.describe(),
        suffix = pose.prompt_suffix.trim_end_matches('.'),
    );

    if attempt > 1 {
        prompt.push_str(
            "\nIMPORTANT: Previous generation was incorrect. Ensure the view direction and action \
             are correct this time.",
        );
    }

    prompt
}

/// Wrap a yes/no criterion into a JSON-answer verification prompt.
pub fn verify_prompt(criterion: &str) -> String {
    format!(
        "Look at this pixel art image. {} Reply with a valid JSON object: {{ \"valid\": boolean }}",
        criterion.trim()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::character::Attribute;
    use crate::poses;

    #[test]
    fn test_concept_prompt_uses_resolved_values() {
        let spec = CharacterSpec::new()
            .with(Attribute::Race, "Lizardfolk")
            .with(Attribute::Weapon, "crossbow");
        let prompt = concept_prompt(&spec);
        assert!(prompt.contains("- Race: Lizardfolk"));
        assert!(prompt.contains("holding a Crossbow"));
        assert!(prompt.contains("#00ff00"));
        assert!(prompt.contains("ANALYZE the visual style"));
        assert!(prompt.contains("Neutral standing pose"));
    }

    #[test]
    fn test_pose_prompt_first_attempt_has_no_correction() {
        let spec = CharacterSpec::default();
        let pose = poses::find(&spec, "front").unwrap();
        let prompt = pose_prompt(&spec, &pose, 1);
        assert!(prompt.contains("VIEW: standing idle pose, full front facing view, symmetrical."));
        assert!(prompt.contains("A male Human Warrior wearing Plate armor and holding a Sword"));
        assert!(prompt.contains("70%"));
        assert!(!prompt.contains("Previous generation was incorrect"));
    }

    #[test]
    fn test_pose_prompt_later_attempts_are_corrective() {
        let spec = CharacterSpec::default();
        let pose = poses::find(&spec, "left").unwrap();
        for attempt in 2..=5 {
            assert!(pose_prompt(&spec, &pose, attempt).contains("Previous generation was incorrect"));
        }
    }

    #[test]
    fn test_suffix_trailing_period_not_doubled() {
        let spec = CharacterSpec::default();
        let pose = poses::find(&spec, "kneel-back").unwrap();
        assert!(pose_prompt(&spec, &pose, 1).contains("One knee on the ground.\n"));
    }

    #[test]
    fn test_verify_prompt() {
        assert_eq!(
            verify_prompt("Is the character facing LEFT? Answer YES or NO."),
            "Look at this pixel art image. Is the character facing LEFT? Answer YES or NO. \
             Reply with a valid JSON object: { \"valid\": boolean }"
        );
    }
}
