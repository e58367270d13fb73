//! Social-style content tags attached to a finished character, kept apart
//! from the persona vocabulary.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentCategory {
    Trending,
    Lifestyle,
    Aesthetic,
    Vibe,
    Relationship,
    Personality,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ContentTag {
    pub id: &'static str,
    pub label: &'static str,
    pub category: ContentCategory,
}

const fn tag(id: &'static str, label: &'static str, category: ContentCategory) -> ContentTag {
    ContentTag { id, label, category }
}

use ContentCategory::*;

pub static CONTENT_TAGS: &[ContentTag] = &[
    tag("fyp", "FYP", Trending),
    tag("viral", "Viral", Trending),
    tag("trending", "Trending", Trending),
    tag("explore", "Explore", Trending),
    tag("foryou", "ForYou", Trending),
    tag("newhere", "NewHere", Trending),
    tag("follow4follow", "Follow4Follow", Trending),
    tag("dailylife", "DailyLife", Lifestyle),
    tag("selfcare", "SelfCare", Lifestyle),
    tag("wellness", "Wellness", Lifestyle),
    tag("fitness", "Fitness", Lifestyle),
    tag("foodie", "Foodie", Lifestyle),
    tag("travel", "Travel", Lifestyle),
    tag("ootd", "OOTD", Lifestyle),
    tag("skincare", "Skincare", Lifestyle),
    tag("makeup", "Makeup", Lifestyle),
    tag("fashion", "Fashion", Lifestyle),
    tag("aesthetic", "Aesthetic", Aesthetic),
    tag("minimal", "Minimal", Aesthetic),
    tag("vintage", "Vintage", Aesthetic),
    tag("cottagecore", "Cottagecore", Aesthetic),
    tag("darkacademia", "DarkAcademia", Aesthetic),
    tag("y2k", "Y2K", Aesthetic),
    tag("softgirl", "SoftGirl", Aesthetic),
    tag("grunge", "Grunge", Aesthetic),
    tag("clean", "CleanGirl", Aesthetic),
    tag("coquette", "Coquette", Aesthetic),
    tag("cozy", "Cozy", Vibe),
    tag("chill", "Chill", Vibe),
    tag("dreamy", "Dreamy", Vibe),
    tag("golden", "GoldenHour", Vibe),
    tag("moody", "Moody", Vibe),
    tag("sunny", "Sunny", Vibe),
    tag("romantic", "Romantic", Vibe),
    tag("mysterious", "Mysterious", Vibe),
    tag("peaceful", "Peaceful", Vibe),
    tag("energetic", "Energetic", Vibe),
    tag("bestie", "Bestie", Relationship),
    tag("bff", "BFF", Relationship),
    tag("soulmate", "Soulmate", Relationship),
    tag("crush", "Crush", Relationship),
    tag("partner", "Partner", Relationship),
    tag("mentor", "Mentor", Relationship),
    tag("muse", "Muse", Relationship),
    tag("companion", "Companion", Relationship),
    tag("sunshine", "Sunshine", Personality),
    tag("sweetheart", "Sweetheart", Personality),
    tag("baddie", "Baddie", Personality),
    tag("boss", "BossBabe", Personality),
    tag("queen", "Queen", Personality),
    tag("angel", "Angel", Personality),
    tag("icon", "Icon", Personality),
    tag("legend", "Legend", Personality),
    tag("vibe", "MainCharacter", Personality),
    tag("itgirl", "ItGirl", Personality),
];

const DEFAULT_SUGGESTIONS: &[&str] = &["FYP", "Trending", "Aesthetic", "Cozy", "Bestie"];
const MAX_SUGGESTIONS: usize = 6;

fn mapping(label: &str) -> &'static [&'static str] {
    match label {
        "Model" => &["OOTD", "Fashion", "ItGirl", "Aesthetic"],
        "Sunshine" => &["Sunny", "Energetic", "Sweetheart", "GoldenHour"],
        "Flirty" => &["Coquette", "Crush", "Romantic", "SoftGirl"],
        "Mysterious" => &["Moody", "DarkAcademia", "Mysterious", "Grunge"],
        "Dark-Academia" => &["DarkAcademia", "Moody", "Vintage"],
        "Gothic" => &["Moody", "Grunge", "Mysterious"],
        "Cottagecore" => &["Cottagecore", "Cozy", "Dreamy"],
        "Clean-Girl" => &["CleanGirl", "Minimal", "SelfCare"],
        "Coquette" => &["Coquette", "SoftGirl", "Romantic"],
        "CEO" | "Mafia-Boss" => &["BossBabe", "Icon", "MainCharacter"],
        "Angel" => &["Angel", "Dreamy", "Peaceful"],
        "Healing-Vibes" | "Wellness-Coach" => &["Wellness", "SelfCare", "Peaceful"],
        "Gym-Buddy" | "Athlete" | "Sporty" => &["Fitness", "Energetic"],
        "Travel-Buddy" => &["Travel", "Explore"],
        "Chef" => &["Foodie", "DailyLife"],
        "Soulmate" => &["Soulmate", "Romantic", "Dreamy", "Coquette"],
        "Childhood-Friend" | "Roommate" => &["BFF", "Bestie", "Companion"],
        "Secret-Admirer" => &["Crush", "Romantic"],
        "Rival" | "Enemies-to-Lovers" => &["Baddie", "MainCharacter", "Queen"],
        _ => &[],
    }
}

/// Suggests content tags for the chosen persona/relationship labels,
/// in first-seen order, capped at six.
pub fn recommend_content_tags<S: AsRef<str>>(labels: &[S]) -> Vec<&'static str> {
    let mut out: Vec<&'static str> = Vec::new();
    for label in labels {
        for t in mapping(label.as_ref()) {
            if !out.contains(t) {
                out.push(t);
            }
        }
    }
    if out.is_empty() {
        return DEFAULT_SUGGESTIONS.to_vec();
    }
    out.truncate(MAX_SUGGESTIONS);
    out
}

pub fn search_content_tags(query: &str) -> Vec<&'static ContentTag> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return CONTENT_TAGS.iter().take(10).collect();
    }
    CONTENT_TAGS
        .iter()
        .filter(|t| t.label.to_lowercase().contains(&query))
        .collect()
}

pub fn by_category(category: ContentCategory) -> Vec<&'static ContentTag> {
    CONTENT_TAGS.iter().filter(|t| t.category == category).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recommendations_dedupe_and_cap() {
        let tags = recommend_content_tags(&["Mysterious", "Gothic", "Model"]);
        assert_eq!(
            tags,
            vec!["Moody", "DarkAcademia", "Mysterious", "Grunge", "OOTD", "Fashion"]
        );
    }

    #[test]
    fn test_unknown_labels_get_defaults() {
        let none: [&str; 0] = [];
        assert_eq!(recommend_content_tags(&none), DEFAULT_SUGGESTIONS.to_vec());
        assert_eq!(recommend_content_tags(&["Pirate"]), DEFAULT_SUGGESTIONS.to_vec());
    }

    #[test]
    fn test_every_suggestion_exists() {
        for label in ["Model", "Sunshine", "Flirty", "CEO", "Soulmate", "Rival", "Chef"] {
            for t in recommend_content_tags(&[label]) {
                assert!(
                    CONTENT_TAGS.iter().any(|c| c.label == t),
                    "{} is not a content tag",
                    t
                );
            }
        }
    }

    #[test]
    fn test_search() {
        assert_eq!(search_content_tags("").len(), 10);
        let found: Vec<_> = search_content_tags("girl").iter().map(|t| t.label).collect();
        assert_eq!(found, vec!["SoftGirl", "CleanGirl", "ItGirl"]);
        assert_eq!(by_category(ContentCategory::Trending).len(), 7);
    }
}
