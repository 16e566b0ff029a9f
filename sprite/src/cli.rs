//! Command-line arguments.

use clap::Parser;
use sprite_core::{Attribute, CharacterSpec, PipelineConfig};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "sprite")]
#[command(
    version,
    about = "Generate a consistent pixel-art sprite set from a style reference"
)]
pub struct Cli {
    /// Style reference image (PNG, JPEG, GIF or WebP)
    #[arg(short, long, value_name = "IMAGE", required_unless_present = "list_poses")]
    pub reference: Option<PathBuf>,

    /// Gender (preset or free text)
    #[arg(long)]
    pub gender: Option<String>,

    /// Race (preset or free text)
    #[arg(long)]
    pub race: Option<String>,

    /// Class (preset or free text)
    #[arg(long)]
    pub class: Option<String>,

    /// Armor (preset or free text)
    #[arg(long)]
    pub armor: Option<String>,

    /// Weapon (preset or free text); Bow and Crossbow get ranged attacks
    #[arg(long)]
    pub weapon: Option<String>,

    /// Directory the concept and pose images are written to
    #[arg(short, long, value_name = "DIR", default_value = "sprites")]
    pub out: PathBuf,

    /// Only generate these pose ids (repeatable); default is every pose
    #[arg(short, long = "pose", value_name = "ID")]
    pub poses: Vec<String>,

    /// Print the pose catalog for the chosen character and exit
    #[arg(long)]
    pub list_poses: bool,

    /// Stop after the concept image
    #[arg(long)]
    pub concept_only: bool,

    /// Generate/verify rounds per pose
    #[arg(long, value_name = "N")]
    pub max_attempts: Option<u32>,

    /// Poses generated at the same time
    #[arg(long, value_name = "N")]
    pub concurrency: Option<usize>,
}

impl Cli {
    /// Character built from the attribute flags over the defaults.
    pub fn character(&self) -> CharacterSpec {
        let flags = [
            (Attribute::Gender, &self.gender),
            (Attribute::Race, &self.race),
            (Attribute::Class, &self.class),
            (Attribute::Armor, &self.armor),
            (Attribute::Weapon, &self.weapon),
        ];

        flags
            .into_iter()
            .fold(CharacterSpec::default(), |spec, (attribute, value)| match value {
                Some(value) => spec.with(attribute, value),
                None => spec,
            })
    }

    /// Apply the numeric overrides to `config`.
    pub fn apply(&self, mut config: PipelineConfig) -> PipelineConfig {
        if let Some(max_attempts) = self.max_attempts {
            config = config.with_max_attempts(max_attempts);
        }
        if let Some(concurrency) = self.concurrency {
            config = config.with_max_concurrency(concurrency);
        }
        config
    }
}
