//! Lines the character speaks while its images are being generated, and
//! once they are ready.

use rand::seq::IndexedRandom;

pub static WAITING_PHRASES: [&str; 20] = [
    // playful
    "Hey, don't go anywhere! I'm almost ready to meet you.",
    "Just a sec... I'm picking out my best look for you.",
    "Hold tight! Magic takes a moment, you know?",
    "Patience, darling. Good things come to those who wait.",
    "Still here? Good. I was worried you'd leave me.",
    // warm
    "Take a deep breath... I'll be with you soon.",
    "Close your eyes for a second. When you open them, I'll be there.",
    "Almost ready... thanks for waiting for me.",
    "I promise I'm worth the wait.",
    "Just getting ready to make your day better.",
    // confident
    "Miss me already? I'm almost there.",
    "Getting gorgeous takes time. Trust the process.",
    "I hope you're ready for this... because I am.",
    "The wait is almost over. Get excited.",
    "I've been waiting to meet you too, you know.",
    // mysterious
    "Some things can't be rushed. I'm one of them.",
    "Loading my personality... this might take a second.",
    "Buffering my charm... please stand by.",
    "Hang on... I'm putting on my best face for you.",
    "Creating something special just for you...",
];

pub static COMPLETION_PHRASES: [&str; 20] = [
    // excited
    "Tada! I'm ready! Now pick your favorite look for me!",
    "Finally! Check out my new styles... which one do you like best?",
    "Boom! Done! Now comes the fun part... choose wisely!",
    "We made it! Now let's find the perfect vibe together.",
    "Surprise! I cleaned up pretty nice, didn't I?",
    // playful
    "Okay, okay, I'm here! Miss me? Now pick your favorite!",
    "Worth the wait, right? Go ahead, pick the one that speaks to you.",
    "I've got options now! Swipe through and find your perfect match.",
    "Alright, decision time! Which version of me do you vibe with?",
    "Here I am! Four looks, one me... which one steals your heart?",
    // confident
    "Looking good, aren't I? Your turn to choose.",
    "I hope you're impressed. Now, pick your favorite... no pressure.",
    "Ready to make this official? Choose the look that feels right.",
    "I dressed up just for you. So... what do you think?",
    "The magic happened! Now pick the one you can't stop staring at.",
    // warm
    "All done! Take your time, find the one that feels like us.",
    "Here we go! Pick the style that makes you smile.",
    "I'm all yours now. Which look matches your vibe?",
    "Done loading! Now the fun begins... choose your favorite!",
    "Ready when you are! Pick a look and let's make some memories.",
];

const WAITING_MOODS: [&str; 4] = ["playful", "warm", "confident", "mysterious"];
const COMPLETION_MOODS: [&str; 4] = ["excited", "playful", "confident", "warm"];
const PER_MOOD: usize = 5;

fn pick(phrases: &'static [&'static str]) -> &'static str {
    phrases.choose(&mut rand::rng()).copied().unwrap_or("")
}

fn mood_slice(
    phrases: &'static [&'static str; 20],
    moods: &[&str],
    mood: &str,
) -> Option<&'static [&'static str]> {
    let idx = moods.iter().position(|m| m.eq_ignore_ascii_case(mood.trim()))?;
    phrases.get(idx * PER_MOOD..(idx + 1) * PER_MOOD)
}

pub fn random_waiting_phrase() -> &'static str {
    pick(&WAITING_PHRASES)
}

pub fn random_completion_phrase() -> &'static str {
    pick(&COMPLETION_PHRASES)
}

/// Unknown moods (including "random") pick from the whole list.
pub fn waiting_phrase_for(mood: &str) -> &'static str {
    mood_slice(&WAITING_PHRASES, &WAITING_MOODS, mood)
        .map(pick)
        .unwrap_or_else(random_waiting_phrase)
}

pub fn completion_phrase_for(mood: &str) -> &'static str {
    mood_slice(&COMPLETION_PHRASES, &COMPLETION_MOODS, mood)
        .map(pick)
        .unwrap_or_else(random_completion_phrase)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mood_picks_stay_in_their_group() {
        for _ in 0..20 {
            let p = waiting_phrase_for("mysterious");
            assert!(WAITING_PHRASES[15..].contains(&p));
            let p = completion_phrase_for("Excited");
            assert!(COMPLETION_PHRASES[..5].contains(&p));
        }
    }

    #[test]
    fn test_unknown_mood_is_random() {
        let p = waiting_phrase_for("random");
        assert!(WAITING_PHRASES.contains(&p));
        let p = completion_phrase_for("grumpy");
        assert!(COMPLETION_PHRASES.contains(&p));
        assert!(!random_waiting_phrase().is_empty());
    }
}
