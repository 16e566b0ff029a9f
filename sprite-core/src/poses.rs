//! The pose catalog.
//!
//! Idle, under-hit, walking and kneeling poses are fixed. Attack poses come
//! in two phases per direction and depend on the weapon: ranged weapons are
//! drawn and fired, melee weapons are raised and swung.

use crate::character::{CharacterSpec, WeaponCategory};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A named view/action template with its own prompt and acceptance question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoseDescriptor {
    /// Stable key for results and status.
    pub id: String,
    /// Display name, also used for exported file names.
    pub label: String,
    /// Pose-specific instruction appended to the sprite prompt.
    pub prompt_suffix: String,
    /// Yes/no question the verifier answers about a generated image.
    pub criterion: String,
}

impl PoseDescriptor {
    fn new(id: &str, label: &str, prompt_suffix: &str, criterion: &str) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            prompt_suffix: prompt_suffix.to_string(),
            criterion: criterion.to_string(),
        }
    }
}

/// Facing used by the attack poses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Front,
    Left,
    Right,
    Back,
}

impl Direction {
    pub fn all() -> &'static [Direction] {
        &[
            Direction::Front,
            Direction::Left,
            Direction::Right,
            Direction::Back,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Direction::Front => "Front",
            Direction::Left => "Left",
            Direction::Right => "Right",
            Direction::Back => "Back",
        }
    }

    fn key(&self) -> &'static str {
        match self {
            Direction::Front => "f",
            Direction::Left => "l",
            Direction::Right => "r",
            Direction::Back => "b",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Id of the wind-up attack pose for a direction (`at-p1-f`, ...).
pub fn attack_windup_id(direction: Direction) -> String {
    format!("at-p1-{}", direction.key())
}

/// Id of the release attack pose for a direction (`at-p2-f`, ...).
pub fn attack_release_id(direction: Direction) -> String {
    format!("at-p2-{}", direction.key())
}

/// Every pose for the given character, in display order.
pub fn catalog(spec: &CharacterSpec) -> Vec<PoseDescriptor> {
    let mut poses = base_poses();
    let category = spec.weapon_category();
    let weapon = spec.weapon.value();
    for direction in Direction::all() {
        poses.push(attack_windup(*direction, category, weapon));
        poses.push(attack_release(*direction, category, weapon));
    }
    poses
}

/// Look up a single pose by id.
pub fn find(spec: &CharacterSpec, id: &str) -> Option<PoseDescriptor> {
    catalog(spec).into_iter().find(|pose| pose.id == id)
}

fn base_poses() -> Vec<PoseDescriptor> {
    vec![
        // Idle
        PoseDescriptor::new(
            "front",
            "Front",
            "standing idle pose, full front facing view, symmetrical",
            "Is the character facing forward? Answer YES or NO.",
        ),
        PoseDescriptor::new(
            "left",
            "Left",
            "standing idle pose, side profile facing LEFT, body turned left",
            "Is the character facing LEFT? Answer YES or NO.",
        ),
        PoseDescriptor::new(
            "right",
            "Right",
            "standing idle pose, side profile facing RIGHT, body turned right",
            "Is the character facing RIGHT? Answer YES or NO.",
        ),
        PoseDescriptor::new(
            "back",
            "Back",
            "standing idle pose, full back view, facing away",
            "Is the character facing away? Answer YES or NO.",
        ),
        // Under hit
        PoseDescriptor::new(
            "hit-front",
            "Hit (Front)",
            "full front view. The character is crouched low in an \"under hit\" or taking damage pose. \
             The body is compacted, knees bent deeply. The weapon is held horizontally very low across \
             the shins and knees in a defensive manner. Expression: Eyes tightly closed in a \"> <\" \
             shape (pain expression). Stance: Unsteady, stumbling.",
            "Is the character crouched low facing forward with a pain expression? Answer YES or NO.",
        ),
        PoseDescriptor::new(
            "hit-left",
            "Hit (Left)",
            "left side profile view, facing left. The character is crouched low in an \"under hit\" \
             pose, hunched slightly over. The weapon is held horizontally very low along the left side, \
             just above the ground. Expression: Eyes tightly closed in a \"> <\" shape (pain \
             expression). Stance: Unsteady, stumbling.",
            "Is the character crouched low facing LEFT with a pain expression? Answer YES or NO.",
        ),
        PoseDescriptor::new(
            "hit-right",
            "Hit (Right)",
            "right side profile view, facing right. The character is crouched low in an \"under hit\" \
             pose, hunched slightly over. The weapon is held horizontally very low along the right \
             side, just above the ground. Expression: Eyes tightly closed in a \"> <\" shape (pain \
             expression). Stance: Unsteady, stumbling.",
            "Is the character crouched low facing RIGHT with a pain expression? Answer YES or NO.",
        ),
        PoseDescriptor::new(
            "hit-back",
            "Hit (Back)",
            "full back view, facing away from the camera. The character is crouched low in an \"under \
             hit\" pose. The weapon is held horizontally low across the back of the calves or heels. \
             Stance: Unsteady, stumbling.",
            "Is the character crouched low facing AWAY? Answer YES or NO.",
        ),
        // Walking
        PoseDescriptor::new(
            "walk-f-r",
            "Walk - Right Foot (Front)",
            "walking pose, front view. Right leg lifted high and stepping forward towards the camera \
             (shoe sole visible). Left leg firmly on ground behind.",
            "Is the character facing forward with the RIGHT leg lifted or stepping forward? Answer YES or NO.",
        ),
        PoseDescriptor::new(
            "walk-f-l",
            "Walk - Left Foot (Front)",
            "walking pose, front view. Left leg lifted high and stepping forward towards the camera \
             (shoe sole visible). Right leg firmly on ground behind.",
            "Is the character facing forward with the LEFT leg lifted or stepping forward? Answer YES or NO.",
        ),
        PoseDescriptor::new(
            "walk-side-l",
            "Walk (Left)",
            "walking pose, profile view facing LEFT",
            "Is the character facing LEFT and walking? Answer YES or NO.",
        ),
        PoseDescriptor::new(
            "walk-side-r",
            "Walk (Right)",
            "walking pose, profile view facing RIGHT",
            "Is the character facing RIGHT and walking? Answer YES or NO.",
        ),
        // High kneel
        PoseDescriptor::new(
            "kneel-front",
            "Kneel (Front)",
            "full front view, high kneeling pose (half-kneeling). One knee on the ground, the other \
             knee up. Torso upright. Weapon held ready.",
            "Is the character kneeling facing forward? Answer YES or NO.",
        ),
        PoseDescriptor::new(
            "kneel-left",
            "Kneel (Left)",
            "left side profile view, facing left. High kneeling pose (half-kneeling). One knee on the \
             ground, upright posture.",
            "Is the character kneeling facing LEFT? Answer YES or NO.",
        ),
        PoseDescriptor::new(
            "kneel-right",
            "Kneel (Right)",
            "right side profile view, facing right. High kneeling pose (half-kneeling). One knee on \
             the ground, upright posture.",
            "Is the character kneeling facing RIGHT? Answer YES or NO.",
        ),
        PoseDescriptor::new(
            "kneel-back",
            "Kneel (Back)",
            "full back view, facing away from the camera. High kneeling pose (half-kneeling). One knee \
             on the ground.",
            "Is the character kneeling facing away (showing back)? Answer YES or NO.",
        ),
    ]
}

fn attack_windup(direction: Direction, category: WeaponCategory, weapon: &str) -> PoseDescriptor {
    let (label, prompt_suffix, criterion) = match (category, direction) {
        (WeaponCategory::Ranged, Direction::Front) => (
            "Attack - Draw",
            format!(
                "front view, holding {weapon} with both hands, pulling back the string/mechanism to \
                 full draw, aiming directly at the camera. Tension in the pose. Ready to fire."
            ),
            "Is the character aiming a bow or crossbow? Answer YES or NO.".to_string(),
        ),
        (WeaponCategory::Ranged, Direction::Left | Direction::Right) => {
            let side = side_word(direction);
            (
                "Attack - Draw",
                format!(
                    "facing {side}, holding {weapon}, string/mechanism pulled back to full draw, \
                     aiming straight {side}."
                ),
                format!("Is the character aiming {side}? Answer YES or NO."),
            )
        }
        (WeaponCategory::Ranged, Direction::Back) => (
            "Attack - Draw",
            format!(
                "facing BACK, holding {weapon}, string/mechanism pulled back to full draw, aiming \
                 away from the camera."
            ),
            "Is the character facing AWAY and aiming? Answer YES or NO.".to_string(),
        ),
        (WeaponCategory::Melee, Direction::Front) => (
            "Attack - Raise",
            "front view, weapon held high above head with both hands, wound up to swing down in a \
             powerful strike. No energy effects."
                .to_string(),
            "Is the character holding a weapon high above their head? Answer YES or NO.".to_string(),
        ),
        (WeaponCategory::Melee, Direction::Left | Direction::Right) => {
            let side = side_word(direction);
            (
                "Attack - Raise",
                format!(
                    "facing {side}, weapon raised high above head, poised to swing down in a \
                     downward chop. No energy effects."
                ),
                format!("Is the character facing {side} with weapon raised high? Answer YES or NO."),
            )
        }
        (WeaponCategory::Melee, Direction::Back) => (
            "Attack - Raise",
            "facing BACK, weapon held high above head, ready to swing down in a downward strike. \
             No energy effects."
                .to_string(),
            "Is the character facing BACK with weapon raised high? Answer YES or NO.".to_string(),
        ),
    };

    PoseDescriptor {
        id: attack_windup_id(direction),
        label: format!("{label} ({direction})"),
        prompt_suffix,
        criterion,
    }
}

fn attack_release(direction: Direction, category: WeaponCategory, weapon: &str) -> PoseDescriptor {
    let (label, prompt_suffix, criterion) = match (category, direction) {
        (WeaponCategory::Ranged, Direction::Front) => (
            "Attack - Fire",
            format!(
                "front view, dynamic action pose. Releasing the {weapon} to fire a projectile forward \
                 towards the camera. Recoil from the shot. Slight wind effect line."
            ),
            "Is the character firing a projectile? Answer YES or NO.".to_string(),
        ),
        (WeaponCategory::Ranged, Direction::Left | Direction::Right) => {
            let side = side_word(direction);
            let lower = side.to_lowercase();
            (
                "Attack - Fire",
                format!(
                    "facing {side}, action pose. The {weapon} has just been released to fire a \
                     projectile to the {side}, flying {lower} with a motion trail."
                ),
                format!("Is the character firing a projectile to the {side}? Answer YES or NO."),
            )
        }
        (WeaponCategory::Ranged, Direction::Back) => (
            "Attack - Fire",
            format!(
                "facing BACK, action pose. Releasing the {weapon} to fire a projectile away from the \
                 camera. Recoil visible."
            ),
            "Is the character firing a projectile away from the viewer? Answer YES or NO.".to_string(),
        ),
        (WeaponCategory::Melee, Direction::Front) => (
            "Attack - Slash",
            "front view, dynamic action pose. Right leg lunging forward. Middle of a horizontal \
             weapon swing generating a massive, jagged, white crescent-shaped shockwave slash effect."
                .to_string(),
            "Is there a visible large crescent slash effect? Answer YES or NO.".to_string(),
        ),
        (WeaponCategory::Melee, Direction::Left | Direction::Right) => {
            let side = side_word(direction);
            (
                "Attack - Slash",
                format!(
                    "facing {side}, horizontal swing. A massive, sharp, curved white energy \
                     shockwave/slash effect extending widely to the {side}."
                ),
                format!(
                    "Is there a large curved slash effect extending to the {side}? Answer YES or NO."
                ),
            )
        }
        (WeaponCategory::Melee, Direction::Back) => (
            "Attack - Slash",
            "facing BACK, horizontal swing. A wide, sweeping white shockwave slash effect visible \
             following the weapon's path."
                .to_string(),
            "Is there an attack wave visible while the character faces away? Answer YES or NO."
                .to_string(),
        ),
    };

    PoseDescriptor {
        id: attack_release_id(direction),
        label: format!("{label} ({direction})"),
        prompt_suffix,
        criterion,
    }
}

fn side_word(direction: Direction) -> &'static str {
    match direction {
        Direction::Left => "LEFT",
        Direction::Right => "RIGHT",
        Direction::Front => "FRONT",
        Direction::Back => "BACK",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::character::{Attribute, RANGED_WEAPONS, WEAPONS};
    use std::collections::HashSet;

    const RANGED_TERMS: &[&str] = &["aim", "draw", "fire"];
    const MELEE_TERMS: &[&str] = &["swing", "slash"];

    fn spec_with_weapon(weapon: &str) -> CharacterSpec {
        CharacterSpec::new().with(Attribute::Weapon, weapon)
    }

    fn mentions_any(text: &str, terms: &[&str]) -> bool {
        let text = text.to_lowercase();
        terms.iter().any(|term| text.contains(term))
    }

    #[test]
    fn test_catalog_size_and_unique_ids() {
        let poses = catalog(&CharacterSpec::default());
        assert_eq!(poses.len(), 24);

        let ids: HashSet<_> = poses.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids.len(), poses.len());

        let labels: HashSet<_> = poses.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels.len(), poses.len());
    }

    #[test]
    fn test_ids_are_stable_across_weapons() {
        let melee: Vec<_> = catalog(&spec_with_weapon("Sword"))
            .into_iter()
            .map(|p| p.id)
            .collect();
        let ranged: Vec<_> = catalog(&spec_with_weapon("Bow"))
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(melee, ranged);
    }

    #[test]
    fn test_ranged_weapons_aim_and_fire_in_every_direction() {
        for weapon in RANGED_WEAPONS {
            let spec = spec_with_weapon(weapon);
            for direction in Direction::all() {
                for id in [attack_windup_id(*direction), attack_release_id(*direction)] {
                    let pose = find(&spec, &id).unwrap();
                    assert!(
                        mentions_any(&pose.prompt_suffix, RANGED_TERMS),
                        "{weapon} {id}: {}",
                        pose.prompt_suffix
                    );
                    assert!(
                        mentions_any(&pose.criterion, &["projectile", "aim"]),
                        "{weapon} {id}: {}",
                        pose.criterion
                    );
                    assert!(!mentions_any(&pose.prompt_suffix, MELEE_TERMS), "{weapon} {id}");
                }
            }
        }
    }

    #[test]
    fn test_melee_weapons_swing_and_slash_in_every_direction() {
        for weapon in WEAPONS.iter().filter(|w| !RANGED_WEAPONS.contains(*w)) {
            let spec = spec_with_weapon(weapon);
            for direction in Direction::all() {
                for id in [attack_windup_id(*direction), attack_release_id(*direction)] {
                    let pose = find(&spec, &id).unwrap();
                    assert!(
                        mentions_any(&pose.prompt_suffix, MELEE_TERMS),
                        "{weapon} {id}: {}",
                        pose.prompt_suffix
                    );
                    assert!(!mentions_any(&pose.prompt_suffix, RANGED_TERMS), "{weapon} {id}");
                    assert!(!mentions_any(&pose.criterion, &["projectile", "aim"]), "{weapon} {id}");
                }
            }
        }
    }

    #[test]
    fn test_ranged_prompt_names_the_weapon() {
        let pose = find(&spec_with_weapon("Crossbow"), "at-p2-l").unwrap();
        assert!(pose.prompt_suffix.contains("Crossbow"));
        assert_eq!(pose.label, "Attack - Fire (Left)");
    }

    #[test]
    fn test_find_unknown() {
        assert!(find(&CharacterSpec::default(), "cartwheel").is_none());
    }
}
