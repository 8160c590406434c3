// Copyright (C) 2025 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use crate::kit::Voice;

/// Returns the voices a trigger of `voice` must silence: every other voice that
/// shares its mute group. Voices without a group choke nothing.
pub fn targets<'a>(voice: &Voice, voices: &'a [Voice]) -> Vec<&'a Voice> {
    let Some(group) = voice.mute_group() else {
        return Vec::new();
    };

    voices
        .iter()
        .filter(|other| other.id() != voice.id() && other.mute_group() == Some(group))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kit() -> Vec<Voice> {
        vec![
            Voice::new("hat_close", None, "Hi-Hat Cl", None).with_mute_group(Some(1)),
            Voice::new("hat_open", None, "Hi-Hat Op", None).with_mute_group(Some(1)),
            Voice::new("hat_pedal", None, "Hi-Hat Pd", None).with_mute_group(Some(1)),
            Voice::new("crash1", None, "Crash 1", None).with_mute_group(Some(2)),
            Voice::new("kick", None, "Kick", None),
            Voice::new("snare", None, "Snare", None).with_mute_group(Some(0)),
            Voice::new("tom1", None, "Tom 1", None).with_mute_group(Some(0)),
        ]
    }

    fn ids(voices: Vec<&Voice>) -> Vec<&str> {
        voices.into_iter().map(Voice::id).collect()
    }

    #[test]
    fn test_group_members_are_choked() {
        let voices = kit();
        assert_eq!(
            ids(targets(&voices[1], &voices)),
            vec!["hat_close", "hat_pedal"]
        );
        assert_eq!(
            ids(targets(&voices[0], &voices)),
            vec!["hat_open", "hat_pedal"]
        );
    }

    #[test]
    fn test_voice_never_chokes_itself() {
        let voices = kit();
        assert!(targets(&voices[3], &voices).is_empty());
    }

    #[test]
    fn test_no_group_chokes_nothing() {
        let voices = kit();
        assert!(targets(&voices[4], &voices).is_empty());
        // Group 0 means "no group".
        assert!(targets(&voices[5], &voices).is_empty());
    }
}
