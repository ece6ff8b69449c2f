use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::time::{Duration, Instant};

pub const KEY_DEBOUNCE: Duration = Duration::from_millis(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Quit,
    Escape,
    Down,
    Up,
    PageDown,
    PageUp,
    Top,
    Bottom,
    Collapse,
    Expand,
    Toggle,
    CollapseAll,
    ExpandAll,
    ToggleHelp,
    ExecSession,
    LogsSession,
    FollowLogsSession,
    Shortcut(char),
}

pub fn map_key(key: KeyEvent) -> Option<Action> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Char('c') if ctrl => Some(Action::Quit),
        KeyCode::Char('e') if ctrl => Some(Action::ExecSession),
        KeyCode::Char('l') if ctrl => Some(Action::LogsSession),
        KeyCode::Char('k') if ctrl => Some(Action::FollowLogsSession),
        _ if ctrl || key.modifiers.contains(KeyModifiers::ALT) => None,
        KeyCode::Char('q') => Some(Action::Quit),
        KeyCode::Esc => Some(Action::Escape),
        KeyCode::Char('j') | KeyCode::Down => Some(Action::Down),
        KeyCode::Char('k') | KeyCode::Up => Some(Action::Up),
        KeyCode::PageDown => Some(Action::PageDown),
        KeyCode::PageUp => Some(Action::PageUp),
        KeyCode::Home => Some(Action::Top),
        KeyCode::End => Some(Action::Bottom),
        KeyCode::Left => Some(Action::Collapse),
        KeyCode::Right => Some(Action::Expand),
        KeyCode::Enter => Some(Action::Toggle),
        KeyCode::Char('c') => Some(Action::CollapseAll),
        KeyCode::Char('e') => Some(Action::ExpandAll),
        KeyCode::Char('?') => Some(Action::ToggleHelp),
        KeyCode::Char(c) if !c.is_control() => Some(Action::Shortcut(c)),
        _ => None,
    }
}

/// Drops a key that repeats the last accepted one within [`KEY_DEBOUNCE`], so held
/// keys are throttled rather than swallowed.
#[derive(Debug, Default)]
pub struct KeyDebouncer {
    last: Option<(KeyCode, KeyModifiers, Instant)>,
}

impl KeyDebouncer {
    pub fn accept(&mut self, key: KeyEvent, now: Instant) -> bool {
        let duplicate = self.last.is_some_and(|(code, modifiers, at)| {
            code == key.code
                && modifiers == key.modifiers
                && now.saturating_duration_since(at) < KEY_DEBOUNCE
        });
        if duplicate {
            return false;
        }
        self.last = Some((key.code, key.modifiers, now));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::{Action, KeyDebouncer, map_key};
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use std::time::{Duration, Instant};

    fn plain(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    #[test]
    fn navigation_keys_map() {
        assert_eq!(map_key(plain(KeyCode::Char('j'))), Some(Action::Down));
        assert_eq!(map_key(plain(KeyCode::Up)), Some(Action::Up));
        assert_eq!(map_key(plain(KeyCode::PageDown)), Some(Action::PageDown));
        assert_eq!(map_key(plain(KeyCode::End)), Some(Action::Bottom));
        assert_eq!(map_key(plain(KeyCode::Left)), Some(Action::Collapse));
        assert_eq!(map_key(plain(KeyCode::Enter)), Some(Action::Toggle));
    }

    #[test]
    fn control_chords_trigger_sessions_and_quit() {
        assert_eq!(map_key(ctrl('c')), Some(Action::Quit));
        assert_eq!(map_key(ctrl('e')), Some(Action::ExecSession));
        assert_eq!(map_key(ctrl('l')), Some(Action::LogsSession));
        assert_eq!(map_key(ctrl('k')), Some(Action::FollowLogsSession));
        assert_eq!(map_key(ctrl('x')), None);
    }

    #[test]
    fn plain_chars_fall_through_to_shortcuts() {
        assert_eq!(map_key(plain(KeyCode::Char('c'))), Some(Action::CollapseAll));
        assert_eq!(map_key(plain(KeyCode::Char('e'))), Some(Action::ExpandAll));
        assert_eq!(map_key(plain(KeyCode::Char('1'))), Some(Action::Shortcut('1')));
        assert_eq!(
            map_key(KeyEvent::new(KeyCode::Char('G'), KeyModifiers::SHIFT)),
            Some(Action::Shortcut('G'))
        );
        assert_eq!(
            map_key(KeyEvent::new(KeyCode::Char('1'), KeyModifiers::ALT)),
            None
        );
    }

    #[test]
    fn debouncer_drops_rapid_repeats_only() {
        let mut debouncer = KeyDebouncer::default();
        let start = Instant::now();
        let down = plain(KeyCode::Down);

        assert!(debouncer.accept(down, start));
        assert!(!debouncer.accept(down, start + Duration::from_millis(2)));
        assert!(debouncer.accept(plain(KeyCode::Up), start + Duration::from_millis(3)));
        assert!(debouncer.accept(down, start + Duration::from_millis(4)));
        assert!(debouncer.accept(down, start + Duration::from_millis(20)));
    }

    #[test]
    fn held_key_is_throttled_not_swallowed() {
        let mut debouncer = KeyDebouncer::default();
        let start = Instant::now();
        let down = plain(KeyCode::Down);

        let accepted = (0..10u64)
            .map(|step| step * 3)
            .filter(|millis| debouncer.accept(down, start + Duration::from_millis(*millis)))
            .collect::<Vec<_>>();
        assert_eq!(accepted, vec![0, 6, 12, 18, 24]);
    }
}
