use crate::core::state::GeneratedImage;
use crate::services::tags::library::{self, TagCandidate, TagNamespace};
use crate::services::voice::VoiceEntry;
use anyhow::{anyhow, Result};
use inquire::{Confirm, MultiSelect, Select};

/// The choices the wizard leaves to the user.
pub trait Selector {
    /// Persona, relationship and targeting tag ids.
    fn pick_tags(&self, candidates: &[TagCandidate], recommended: &[String]) -> Result<Vec<String>>;
    fn pick_style(&self, images: &[GeneratedImage]) -> Result<usize>;
    fn pick_voice(&self, voices: &[VoiceEntry], recommended: &str) -> Result<String>;
    fn confirm_regenerate(&self) -> Result<bool>;
}

/// Takes every recommendation; used when `unattended` is set.
#[derive(Debug, Default)]
pub struct AutoSelector;

impl Selector for AutoSelector {
    fn pick_tags(&self, candidates: &[TagCandidate], recommended: &[String]) -> Result<Vec<String>> {
        let mut ids: Vec<String> = Vec::new();
        for label in recommended {
            // a recommended candidate wins over a library lookup
            let id = candidates
                .iter()
                .find(|c| c.label().eq_ignore_ascii_case(label))
                .map(TagCandidate::id)
                .or_else(|| library::find_by_label(label).map(|t| t.id.to_string()));
            if let Some(id) = id {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }
        Ok(ids)
    }

    fn pick_style(&self, images: &[GeneratedImage]) -> Result<usize> {
        Ok(images
            .iter()
            .skip(1)
            .find(|i| i.is_usable())
            .map(|i| i.id)
            .unwrap_or(0))
    }

    fn pick_voice(&self, _voices: &[VoiceEntry], recommended: &str) -> Result<String> {
        Ok(recommended.to_string())
    }

    fn confirm_regenerate(&self) -> Result<bool> {
        Ok(false)
    }
}

#[derive(Debug, Default)]
pub struct InteractiveSelector;

fn tag_option(candidate: &TagCandidate, recommended: &[String]) -> String {
    let star = if recommended
        .iter()
        .any(|l| l.eq_ignore_ascii_case(candidate.label()))
    {
        " *"
    } else {
        ""
    };
    format!(
        "{} {} [{}]{}",
        candidate.emoji(),
        candidate.label(),
        candidate.id(),
        star
    )
}

/// The id sits in the last bracket pair of an option line.
fn id_of(option: &str) -> Option<String> {
    let start = option.rfind('[')?;
    let end = option[start..].find(']')? + start;
    Some(option[start + 1..end].to_string())
}

impl InteractiveSelector {
    fn pick_single(&self, prompt: &str, namespace: TagNamespace, recommended: &[String]) -> Result<Option<String>> {
        let mut options = vec!["(none)".to_string()];
        options.extend(
            library::by_namespace(namespace)
                .iter()
                .map(|t| tag_option(&TagCandidate::Library(t), recommended)),
        );
        let choice = Select::new(prompt, options).prompt()?;
        Ok(id_of(&choice))
    }
}

impl Selector for InteractiveSelector {
    fn pick_tags(&self, candidates: &[TagCandidate], recommended: &[String]) -> Result<Vec<String>> {
        // recommended tags come first but start unticked
        let options: Vec<String> = candidates.iter().map(|t| tag_option(t, recommended)).collect();
        let picked = MultiSelect::new("Pick persona tags (* = recommended):", options)
            .with_page_size(12)
            .prompt()?;
        let mut ids: Vec<String> = picked.iter().filter_map(|o| id_of(o)).collect();

        if let Some(id) = self.pick_single("Relationship:", TagNamespace::Relationship, recommended)? {
            ids.push(id);
        }
        if let Some(id) = self.pick_single("Made for:", TagNamespace::Targeting, recommended)? {
            ids.push(id);
        }
        Ok(ids)
    }

    fn pick_style(&self, images: &[GeneratedImage]) -> Result<usize> {
        let options: Vec<String> = images
            .iter()
            .filter(|i| i.is_usable())
            .map(|i| {
                format!(
                    "#{} {} ({:?})",
                    i.id,
                    i.label.as_deref().unwrap_or("Style"),
                    i.kind
                )
            })
            .collect();
        if options.is_empty() {
            return Err(anyhow!("No usable images to choose from"));
        }
        let choice = Select::new("Pick a style:", options).prompt()?;
        choice
            .trim_start_matches('#')
            .split_whitespace()
            .next()
            .and_then(|n| n.parse().ok())
            .ok_or_else(|| anyhow!("Unexpected selection: {}", choice))
    }

    fn pick_voice(&self, voices: &[VoiceEntry], recommended: &str) -> Result<String> {
        let mut ordered: Vec<&VoiceEntry> = voices.iter().filter(|v| v.id == recommended).collect();
        ordered.extend(voices.iter().filter(|v| v.id != recommended));
        let options: Vec<String> = ordered
            .iter()
            .map(|v| format!("{} ({}) - {} [{}]", v.name, v.gender, v.tags.join(", "), v.id))
            .collect();
        let choice = Select::new("Pick a voice (first = recommended):", options).prompt()?;
        id_of(&choice).ok_or_else(|| anyhow!("Unexpected selection: {}", choice))
    }

    fn confirm_regenerate(&self) -> Result<bool> {
        Ok(Confirm::new("Regenerate the styles?")
            .with_default(false)
            .prompt()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::state::ImageKind;
    use crate::services::tags::default_tag_recommendation;
    use crate::services::voice::catalog::local_voices;

    #[test]
    fn test_auto_picks_recommendations() {
        let rec = default_tag_recommendation();
        let labels: Vec<String> = rec
            .persona_tags
            .iter()
            .chain(rec.relationship_tag.iter())
            .cloned()
            .collect();
        let ids = AutoSelector.pick_tags(&[], &labels).unwrap();
        assert_eq!(ids, vec!["p34", "p56", "p46", "p1", "p3", "p12", "r4"]);

        assert_eq!(AutoSelector.pick_voice(&local_voices(), "calm-man").unwrap(), "calm-man");
        assert!(!AutoSelector.confirm_regenerate().unwrap());
    }

    #[test]
    fn test_auto_style_skips_failed_slots() {
        let mut images = vec![
            GeneratedImage::placeholder(0, "", None),
            GeneratedImage::failed(1, "x".into(), "p", None, 0),
            GeneratedImage::generated(2, "https://x/2.jpg".into(), "p", None, 0),
        ];
        images[0].kind = ImageKind::Original;
        images[0].url = Some("data:image/png;base64,AA".into());
        assert_eq!(AutoSelector.pick_style(&images).unwrap(), 2);
        assert_eq!(AutoSelector.pick_style(&images[..2]).unwrap(), 0);
    }

    #[test]
    fn test_option_lines_round_trip_ids() {
        let tag = TagCandidate::Library(library::find_by_id("r4").unwrap());
        let line = tag_option(&tag, &["secret-admirer".to_string()]);
        assert!(line.ends_with(" *"));
        assert_eq!(id_of(&line).as_deref(), Some("r4"));
        assert_eq!(id_of("(none)"), None);
        assert_eq!(id_of("Calm man (Male) - Calm [calm-man]").as_deref(), Some("calm-man"));

        let custom = TagCandidate::Custom("Street Queen".to_string());
        let line = tag_option(&custom, &["street queen".to_string()]);
        assert!(line.ends_with(" *"));
        assert_eq!(id_of(&line).as_deref(), Some("custom:Street Queen"));
    }

    #[test]
    fn test_auto_picks_invented_labels() {
        let candidates = vec![
            TagCandidate::Custom("Street Queen".to_string()),
            TagCandidate::Library(library::find_by_id("p46").unwrap()),
            TagCandidate::Custom("Partner in Crime".to_string()),
        ];
        let recommended = vec![
            "Street Queen".to_string(),
            "Vampire".to_string(),
            "Partner in Crime".to_string(),
            "Secret-Admirer".to_string(),
        ];
        let ids = AutoSelector.pick_tags(&candidates, &recommended).unwrap();
        assert_eq!(
            ids,
            vec!["custom:Street Queen", "p46", "custom:Partner in Crime", "r4"]
        );
    }
}
