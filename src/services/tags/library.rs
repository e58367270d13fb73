//! The closed tag vocabulary shown in the persona step and handed to the
//! model in library-constrained recommendation.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TagNamespace {
    /// Visual traits a vision model can observe directly.
    Basic,
    /// Multi-select identity, style and roleplay archetypes.
    Persona,
    /// Single-select: the user's relationship to the character.
    Relationship,
    /// Single-select, optional: who the character is made for.
    Targeting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Identity,
    Style,
    Roleplay,
    Content,
    Vibe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Tag {
    pub id: &'static str,
    pub label: &'static str,
    pub emoji: &'static str,
    pub namespace: TagNamespace,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimension: Option<Dimension>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'static str>,
}

const fn basic(id: &'static str, label: &'static str, emoji: &'static str) -> Tag {
    Tag {
        id,
        label,
        emoji,
        namespace: TagNamespace::Basic,
        dimension: None,
        description: None,
    }
}

const fn persona(
    id: &'static str,
    label: &'static str,
    emoji: &'static str,
    dimension: Dimension,
) -> Tag {
    Tag {
        id,
        label,
        emoji,
        namespace: TagNamespace::Persona,
        dimension: Some(dimension),
        description: None,
    }
}

const fn relationship(
    id: &'static str,
    label: &'static str,
    emoji: &'static str,
    description: &'static str,
) -> Tag {
    Tag {
        id,
        label,
        emoji,
        namespace: TagNamespace::Relationship,
        dimension: None,
        description: Some(description),
    }
}

const fn targeting(
    id: &'static str,
    label: &'static str,
    emoji: &'static str,
    description: &'static str,
) -> Tag {
    Tag {
        id,
        label,
        emoji,
        namespace: TagNamespace::Targeting,
        dimension: None,
        description: Some(description),
    }
}

pub static BASIC_TAGS: &[Tag] = &[
    basic("b1", "Smiling", "😊"),
    basic("b2", "Glasses", "👓"),
    basic("b3", "Long-Hair", "💇"),
    basic("b4", "Short-Hair", "✂️"),
    basic("b5", "Outdoor", "🌳"),
    basic("b6", "Studio-Light", "💡"),
    basic("b7", "Formal-Wear", "🤵"),
    basic("b8", "Casual-Wear", "👕"),
];

pub static PERSONA_TAGS: &[Tag] = &[
    persona("p1", "CEO", "💼", Dimension::Identity),
    persona("p2", "Doctor", "🩺", Dimension::Identity),
    persona("p3", "Artist", "🎨", Dimension::Identity),
    persona("p4", "Student", "📚", Dimension::Identity),
    persona("p5", "Idol", "🎤", Dimension::Identity),
    persona("p6", "Mafia-Boss", "🎰", Dimension::Identity),
    persona("p7", "Professor", "🎓", Dimension::Identity),
    persona("p8", "Athlete", "🏆", Dimension::Identity),
    persona("p9", "Chef", "👨‍🍳", Dimension::Identity),
    persona("p10", "Musician", "🎸", Dimension::Identity),
    persona("p11", "Writer", "✍️", Dimension::Identity),
    persona("p12", "Model", "📸", Dimension::Identity),
    persona("p13", "Hacker", "💻", Dimension::Identity),
    persona("p14", "Royalty", "👑", Dimension::Identity),
    persona("p15", "Soldier", "🎖️", Dimension::Identity),
    persona("p16", "Detective", "🔍", Dimension::Identity),
    persona("p17", "Barista", "☕", Dimension::Identity),
    persona("p18", "Pilot", "✈️", Dimension::Identity),
    persona("p19", "Dancer", "💃", Dimension::Identity),
    persona("p20", "Streamer", "🎮", Dimension::Identity),
    persona("p21", "Dark-Academia", "📖", Dimension::Style),
    persona("p22", "Streetwear", "🛹", Dimension::Style),
    persona("p23", "Cottagecore", "🌻", Dimension::Style),
    persona("p24", "Cyberpunk", "🤖", Dimension::Style),
    persona("p25", "Y2K", "💿", Dimension::Style),
    persona("p26", "Gothic", "🦇", Dimension::Style),
    persona("p27", "Old-Money", "💎", Dimension::Style),
    persona("p28", "Kawaii", "🎀", Dimension::Style),
    persona("p29", "Foxy", "🦊", Dimension::Style),
    persona("p30", "Bad-Boy", "😎", Dimension::Style),
    persona("p31", "Soft-Boy", "🐶", Dimension::Style),
    persona("p32", "Cold-Beauty", "❄️", Dimension::Style),
    persona("p33", "Girl-Next-Door", "🏠", Dimension::Style),
    persona("p34", "Mysterious", "🌙", Dimension::Style),
    persona("p35", "Sunshine", "☀️", Dimension::Style),
    persona("p36", "E-Girl", "🖤", Dimension::Style),
    persona("p37", "E-Boy", "⛓️", Dimension::Style),
    persona("p38", "Coquette", "🎀", Dimension::Style),
    persona("p39", "Clean-Girl", "✨", Dimension::Style),
    persona("p40", "Fairycore", "🧚", Dimension::Style),
    persona("p41", "Grunge", "🎸", Dimension::Style),
    persona("p42", "Rockstar", "🤘", Dimension::Style),
    persona("p43", "Anime", "🎌", Dimension::Style),
    persona("p44", "Fantasy", "🏰", Dimension::Style),
    persona("p45", "Sporty", "⚽", Dimension::Style),
    persona("p46", "Vampire", "🧛", Dimension::Roleplay),
    persona("p47", "Werewolf", "🐺", Dimension::Roleplay),
    persona("p48", "Demon", "😈", Dimension::Roleplay),
    persona("p49", "Angel", "👼", Dimension::Roleplay),
    persona("p50", "Yandere", "🔪", Dimension::Roleplay),
    persona("p51", "Tsundere", "💢", Dimension::Roleplay),
    persona("p52", "Kuudere", "🧊", Dimension::Roleplay),
    persona("p53", "Dandere", "😶", Dimension::Roleplay),
    persona("p54", "Villain", "🦹", Dimension::Roleplay),
    persona("p55", "Anti-Hero", "🎭", Dimension::Roleplay),
    persona("p56", "Prince", "🤴", Dimension::Roleplay),
    persona("p57", "Knight", "⚔️", Dimension::Roleplay),
    persona("p58", "Assassin", "🗡️", Dimension::Roleplay),
    persona("p59", "Mage", "🧙", Dimension::Roleplay),
    persona("p60", "Elf", "🧝", Dimension::Roleplay),
    persona("p61", "Ghost", "👻", Dimension::Roleplay),
    persona("p62", "Android", "🤖", Dimension::Roleplay),
    persona("p63", "Pirate", "🏴‍☠️", Dimension::Roleplay),
    persona("p64", "Witch", "🧙‍♀️", Dimension::Roleplay),
    persona("p65", "Fallen-Angel", "🖤", Dimension::Roleplay),
    persona("p66", "Career-Coach", "🧭", Dimension::Content),
    persona("p67", "Language-Tutor", "🗣️", Dimension::Content),
    persona("p68", "Wellness-Coach", "🧘", Dimension::Content),
    persona("p69", "Fashion-Stylist", "👗", Dimension::Content),
    persona("p70", "Study-Buddy", "📝", Dimension::Content),
    persona("p71", "Gym-Buddy", "🏋️", Dimension::Content),
    persona("p72", "Travel-Buddy", "🧳", Dimension::Content),
    persona("p73", "Daily-Companion", "☀️", Dimension::Content),
    persona("p74", "Situationship", "💭", Dimension::Content),
    persona("p75", "Healing-Vibes", "🌧️", Dimension::Content),
    persona("p76", "Late-Night-Talk", "🌙", Dimension::Content),
    persona("p77", "Anime-IP", "🎌", Dimension::Content),
    persona("p78", "Gaming-IP", "🕹️", Dimension::Content),
    persona("p79", "Movie-TV", "🍿", Dimension::Content),
    persona("p80", "ASMR", "🎧", Dimension::Content),
    persona("p81", "Dom", "👑", Dimension::Vibe),
    persona("p82", "Sub", "🔗", Dimension::Vibe),
    persona("p83", "Switch", "🔄", Dimension::Vibe),
    persona("p84", "Brat", "😼", Dimension::Vibe),
    persona("p85", "Gentle-Dom", "🌹", Dimension::Vibe),
    persona("p86", "Possessive", "🔒", Dimension::Vibe),
    persona("p87", "Flirty", "😏", Dimension::Vibe),
    persona("p88", "Jealous", "💚", Dimension::Vibe),
    persona("p89", "Clingy", "🐨", Dimension::Vibe),
    persona("p90", "Aloof", "🧊", Dimension::Vibe),
    persona("p91", "Teasing", "😜", Dimension::Vibe),
    persona("p92", "Protective", "🛡️", Dimension::Vibe),
];

pub static RELATIONSHIP_TAGS: &[Tag] = &[
    relationship("r1", "Soulmate", "💞", "Your perfect match, deeply connected"),
    relationship("r2", "Protector", "🛡️", "Always watching over you"),
    relationship("r3", "Rival", "⚔️", "Competitive tension, pushing each other"),
    relationship("r4", "Secret-Admirer", "🤫", "Hidden feelings, stolen glances"),
    relationship("r5", "Childhood-Friend", "🧒", "Known each other forever"),
    relationship("r6", "Ex", "💔", "History between you two"),
    relationship("r7", "Fake-Dating", "💍", "Pretending... or is it real?"),
    relationship("r8", "Enemies-to-Lovers", "🔥", "From hate to love"),
    relationship("r9", "Roommate", "🏠", "Sharing space, building connection"),
    relationship("r10", "Stranger", "👀", "Just met, instant chemistry"),
    relationship("r11", "Forbidden", "🚫", "Should not, but cannot resist"),
    relationship("r12", "Daddy", "🔥", "Dominant, protective, takes charge"),
    relationship("r13", "Mommy", "💋", "Nurturing, caring, in control"),
    relationship("r14", "Sugar-Daddy", "💰", "Spoils you with everything"),
    relationship("r15", "Sugar-Baby", "🍬", "Pampered and adored"),
    relationship("r16", "Step-Sibling", "👫", "Complicated family dynamics"),
    relationship("r17", "Toxic-Ex", "☠️", "Bad for you, but addictive"),
    relationship("r18", "Obsessed", "💀", "Cannot let you go"),
    relationship("r19", "Pet", "🐾", "Adorable and devoted"),
    relationship("r20", "Master", "👑", "In complete control"),
];

pub static TARGETING_TAGS: &[Tag] = &[
    targeting("t1", "For-Her", "💙", "Male character made for women"),
    targeting("t2", "For-Him", "💖", "Female character made for men"),
    targeting("t3", "BL", "💜", "Male character for BL fans"),
    targeting("t4", "GL", "🧡", "Female character for GL fans"),
    targeting("t5", "Everyone", "🌈", "Adapts to anyone"),
];

pub fn by_namespace(namespace: TagNamespace) -> &'static [Tag] {
    match namespace {
        TagNamespace::Basic => BASIC_TAGS,
        TagNamespace::Persona => PERSONA_TAGS,
        TagNamespace::Relationship => RELATIONSHIP_TAGS,
        TagNamespace::Targeting => TARGETING_TAGS,
    }
}

/// Every selectable tag (basic tags are observation-only and excluded).
pub fn all_tags() -> impl Iterator<Item = &'static Tag> {
    PERSONA_TAGS
        .iter()
        .chain(RELATIONSHIP_TAGS)
        .chain(TARGETING_TAGS)
}

pub fn all_labels() -> Vec<&'static str> {
    all_tags().map(|t| t.label).collect()
}

pub fn persona_by_dimension(dimension: Dimension) -> Vec<&'static Tag> {
    PERSONA_TAGS
        .iter()
        .filter(|t| t.dimension == Some(dimension))
        .collect()
}

pub fn find_by_id(id: &str) -> Option<&'static Tag> {
    all_tags().chain(BASIC_TAGS).find(|t| t.id == id)
}

/// Looks a label up the way it comes back from a model or a user:
/// case-insensitive, ignoring emoji, punctuation, hyphens and spaces.
pub fn find_by_label(label: &str) -> Option<&'static Tag> {
    if let Some(tag) = find_exact_label(label) {
        return Some(tag);
    }
    let squashed = squash(&clean_label(label));
    if squashed.len() < 3 {
        return None;
    }
    let candidates = || all_tags().chain(BASIC_TAGS);
    // Loose containment last; prefer the longest label so "Fallen Angel
    // vibes" lands on Fallen-Angel rather than Angel.
    candidates()
        .filter(|t| {
            let l = squash(&t.label.to_lowercase());
            l.len() >= 3 && (squashed.contains(&l) || l.contains(&squashed))
        })
        .max_by_key(|t| t.label.len())
}

/// Like [`find_by_label`] without the loose containment step, so an
/// invented label is never folded into a library tag it happens to contain.
pub fn find_exact_label(label: &str) -> Option<&'static Tag> {
    let cleaned = clean_label(label);
    if cleaned.is_empty() {
        return None;
    }
    let squashed = squash(&cleaned);
    let candidates = || all_tags().chain(BASIC_TAGS);

    candidates()
        .find(|t| t.label.to_lowercase() == cleaned)
        .or_else(|| candidates().find(|t| squash(&t.label.to_lowercase()) == squashed))
}

/// Looks a label up within one namespace only.
pub fn find_in_namespace(label: &str, namespace: TagNamespace) -> Option<&'static Tag> {
    find_by_label(label).filter(|t| t.namespace == namespace)
}

/// Prefix marking a picker id that carries a label instead of a library id.
pub const CUSTOM_ID_PREFIX: &str = "custom:";

/// One entry of the persona picker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagCandidate {
    Library(&'static Tag),
    /// Label the model invented, outside the library.
    Custom(String),
}

impl TagCandidate {
    pub fn id(&self) -> String {
        match self {
            TagCandidate::Library(tag) => tag.id.to_string(),
            TagCandidate::Custom(label) => format!("{}{}", CUSTOM_ID_PREFIX, label),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            TagCandidate::Library(tag) => tag.label,
            TagCandidate::Custom(label) => label,
        }
    }

    pub fn emoji(&self) -> &str {
        match self {
            TagCandidate::Library(tag) => tag.emoji,
            TagCandidate::Custom(_) => "✨",
        }
    }
}

/// The label inside a custom picker id.
pub fn custom_label(id: &str) -> Option<&str> {
    id.strip_prefix(CUSTOM_ID_PREFIX)
        .map(str::trim)
        .filter(|l| !l.is_empty())
}

fn clean_label(label: &str) -> String {
    label
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '-' || *c == '_' || c.is_whitespace())
        .collect::<String>()
        .trim()
        .to_lowercase()
}

fn squash(s: &str) -> String {
    s.chars()
        .filter(|c| *c != '-' && *c != '_' && !c.is_whitespace())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_ids_unique_within_namespace() {
        for ns in [
            TagNamespace::Basic,
            TagNamespace::Persona,
            TagNamespace::Relationship,
            TagNamespace::Targeting,
        ] {
            let tags = by_namespace(ns);
            let ids: HashSet<_> = tags.iter().map(|t| t.id).collect();
            assert_eq!(ids.len(), tags.len(), "duplicate id in {:?}", ns);
        }
        assert_eq!(PERSONA_TAGS.len(), 92);
        assert_eq!(RELATIONSHIP_TAGS.len(), 20);
        assert_eq!(TARGETING_TAGS.len(), 5);
    }

    #[test]
    fn test_find_by_label_is_forgiving() {
        assert_eq!(find_by_label("vampire").map(|t| t.id), Some("p46"));
        assert_eq!(find_by_label("  CEO ").map(|t| t.id), Some("p1"));
        assert_eq!(find_by_label("Secret Admirer").map(|t| t.id), Some("r4"));
        assert_eq!(find_by_label("🤫 secret-admirer").map(|t| t.id), Some("r4"));
        assert_eq!(find_by_label("mafiaboss").map(|t| t.id), Some("p6"));
        assert_eq!(find_by_label("Fallen Angel").map(|t| t.id), Some("p65"));
        assert_eq!(find_by_label("Angel").map(|t| t.id), Some("p49"));
    }

    #[test]
    fn test_find_by_label_rejects_noise() {
        assert!(find_by_label("").is_none());
        assert!(find_by_label("🔥").is_none());
        assert!(find_by_label("zz").is_none());
        assert!(find_by_label("Quantum Plumber").is_none());
    }

    #[test]
    fn test_namespace_filtering() {
        assert!(find_in_namespace("Rival", TagNamespace::Relationship).is_some());
        assert!(find_in_namespace("Vampire", TagNamespace::Relationship).is_none());
        assert_eq!(persona_by_dimension(Dimension::Vibe).len(), 12);
        assert_eq!(find_by_id("t5").map(|t| t.label), Some("Everyone"));
    }

    #[test]
    fn test_exact_lookup_skips_containment() {
        assert_eq!(find_exact_label("secret admirer").map(|t| t.id), Some("r4"));
        assert!(find_exact_label("Fallen Angel vibes").is_none());
        assert!(find_exact_label("Quantum Plumber").is_none());
    }

    #[test]
    fn test_candidate_ids() {
        let vampire = TagCandidate::Library(find_by_id("p46").unwrap());
        assert_eq!(vampire.id(), "p46");
        assert_eq!(vampire.label(), "Vampire");

        let custom = TagCandidate::Custom("Street Queen".to_string());
        assert_eq!(custom.id(), "custom:Street Queen");
        assert_eq!(custom_label(&custom.id()), Some("Street Queen"));
        assert_eq!(custom_label("custom:  "), None);
        assert_eq!(custom_label("p46"), None);
    }

    #[test]
    fn test_every_label_round_trips() {
        for tag in all_tags() {
            let found = find_by_label(&tag.label.to_uppercase()).unwrap();
            assert_eq!(found.id, tag.id, "label {} did not round-trip", tag.label);
        }
    }
}
