//! Decoding of the ICCCM/EWMH window properties the window manager reads.

use super::atoms::names;
use super::connection::X11ConnectionContext;
use super::wire::{
    Atom, RawProperty, Window, X11Wire, ATOM_ATOM, ATOM_NONE, ATOM_STRING, ATOM_WINDOW,
    ATOM_WM_CLASS, ATOM_WM_NAME, ATOM_WM_NORMAL_HINTS, ATOM_WM_TRANSIENT_FOR,
};
use crate::surface::{MotifHints, SizeHints};

/// Properties read at map time and re-read on change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchedProperty {
    Class,
    Name,
    NetName,
    TransientFor,
    Protocols,
    NormalHints,
    NetState,
    WindowType,
    Motif,
}

impl WatchedProperty {
    pub const ALL: [Self; 9] = [
        Self::Class,
        Self::Name,
        Self::NetName,
        Self::TransientFor,
        Self::Protocols,
        Self::NormalHints,
        Self::NetState,
        Self::WindowType,
        Self::Motif,
    ];

    /// The atom naming this property on `conn`.
    pub fn atom<W: X11Wire>(self, conn: &mut X11ConnectionContext<W>) -> Atom {
        match self {
            Self::Class => ATOM_WM_CLASS,
            Self::Name => ATOM_WM_NAME,
            Self::TransientFor => ATOM_WM_TRANSIENT_FOR,
            Self::NormalHints => ATOM_WM_NORMAL_HINTS,
            Self::NetName => conn.atom(names::NET_WM_NAME),
            Self::Protocols => conn.atom(names::WM_PROTOCOLS),
            Self::NetState => conn.atom(names::NET_WM_STATE),
            Self::WindowType => conn.atom(names::NET_WM_WINDOW_TYPE),
            Self::Motif => conn.atom(names::MOTIF_WM_HINTS),
        }
    }

    /// Which watched property `atom` is, if any.
    pub fn from_atom<W: X11Wire>(conn: &mut X11ConnectionContext<W>, atom: Atom) -> Option<Self> {
        if atom == ATOM_NONE {
            return None;
        }
        Self::ALL.into_iter().find(|kind| kind.atom(conn) == atom)
    }
}

/// A decoded property value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    Text(String),
    Class { instance: String, class: String },
    Window(Option<Window>),
    Atoms(Vec<Atom>),
    SizeHints(SizeHints),
    Motif(MotifHints),
    /// Not set, or set with an unexpected type or format.
    Absent,
}

const P_MIN_SIZE: u32 = 1 << 4;
const P_MAX_SIZE: u32 = 1 << 5;
const P_RESIZE_INC: u32 = 1 << 6;
const P_BASE_SIZE: u32 = 1 << 8;

const MWM_HINTS_DECORATIONS: u32 = 1 << 1;

impl PropertyValue {
    pub fn decode(kind: WatchedProperty, raw: Option<&RawProperty>, utf8_string: Atom) -> Self {
        let Some(raw) = raw.filter(|raw| raw.type_ != ATOM_NONE) else {
            return Self::Absent;
        };
        match kind {
            WatchedProperty::Name | WatchedProperty::NetName => {
                decode_text(raw, utf8_string).map_or(Self::Absent, Self::Text)
            },
            WatchedProperty::Class => decode_class(raw),
            WatchedProperty::TransientFor => decode_window(raw),
            WatchedProperty::Protocols
            | WatchedProperty::NetState
            | WatchedProperty::WindowType => decode_atoms(raw),
            WatchedProperty::NormalHints => decode_size_hints(raw),
            WatchedProperty::Motif => decode_motif(raw),
        }
    }
}

fn decode_text(raw: &RawProperty, utf8_string: Atom) -> Option<String> {
    let bytes = raw.value8()?;
    let bytes = bytes.split(|&b| b == 0).next().unwrap_or_default();
    if raw.type_ == ATOM_STRING {
        // ISO 8859-1 maps byte-for-byte onto the first 256 code points.
        Some(bytes.iter().copied().map(char::from).collect())
    } else if raw.type_ == utf8_string && utf8_string != ATOM_NONE {
        Some(String::from_utf8_lossy(bytes).into_owned())
    } else {
        None
    }
}

fn decode_class(raw: &RawProperty) -> PropertyValue {
    let Some(bytes) = raw.value8() else {
        return PropertyValue::Absent;
    };
    let mut parts = bytes
        .split(|&b| b == 0)
        .map(|part| part.iter().copied().map(char::from).collect::<String>());
    let instance = parts.next().unwrap_or_default();
    let class = parts.next().unwrap_or_default();
    PropertyValue::Class { instance, class }
}

fn decode_window(raw: &RawProperty) -> PropertyValue {
    if raw.type_ != ATOM_WINDOW {
        return PropertyValue::Absent;
    }
    let window = raw
        .value32()
        .and_then(|mut values| values.next())
        .filter(|&window| window != 0);
    PropertyValue::Window(window)
}

fn decode_atoms(raw: &RawProperty) -> PropertyValue {
    if raw.type_ != ATOM_ATOM {
        return PropertyValue::Absent;
    }
    raw.value32()
        .map_or(PropertyValue::Absent, |values| PropertyValue::Atoms(values.collect()))
}

/// Hint values are CARD32 on the wire but sizes are signed in geometry math.
const MAX_HINT: u32 = i32::MAX as u32;

fn decode_size_hints(raw: &RawProperty) -> PropertyValue {
    let Some(values) = raw.value32() else {
        return PropertyValue::Absent;
    };
    let words: Vec<u32> = values.collect();
    if words.len() < 15 {
        return PropertyValue::Absent;
    }
    let flags = words[0];
    let pair = |set: bool, a: usize, b: usize| {
        if set && words.len() > b {
            (Some(words[a].min(MAX_HINT)), Some(words[b].min(MAX_HINT)))
        } else {
            (None, None)
        }
    };

    let (min_width, min_height) = pair(flags & P_MIN_SIZE != 0, 5, 6);
    let (max_width, max_height) = pair(flags & P_MAX_SIZE != 0, 7, 8);
    let (width_increment, height_increment) = pair(flags & P_RESIZE_INC != 0, 9, 10);
    let (base_width, base_height) = match pair(flags & P_BASE_SIZE != 0, 15, 16) {
        // Without a base size, increments count from the minimum size.
        (None, None) if width_increment.is_some() => (
            Some(min_width.unwrap_or(0)),
            Some(min_height.unwrap_or(0)),
        ),
        base => base,
    };

    PropertyValue::SizeHints(SizeHints {
        min_width,
        min_height,
        max_width,
        max_height,
        base_width,
        base_height,
        width_increment,
        height_increment,
    })
}

fn decode_motif(raw: &RawProperty) -> PropertyValue {
    let Some(values) = raw.value32() else {
        return PropertyValue::Absent;
    };
    let words: Vec<u32> = values.collect();
    if words.len() < 3 {
        return PropertyValue::Absent;
    }
    let decorations = (words[0] & MWM_HINTS_DECORATIONS != 0).then_some(words[2] != 0);
    PropertyValue::Motif(MotifHints { decorations })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const UTF8: Atom = 300;

    #[test]
    fn text_encodings() {
        let latin1 = RawProperty::new8(ATOM_STRING, vec![b'c', 0xe9, b'!']);
        assert_eq!(
            PropertyValue::decode(WatchedProperty::Name, Some(&latin1), UTF8),
            PropertyValue::Text("cé!".into())
        );

        let utf8 = RawProperty::new8(UTF8, "fenêtre".as_bytes());
        assert_eq!(
            PropertyValue::decode(WatchedProperty::NetName, Some(&utf8), UTF8),
            PropertyValue::Text("fenêtre".into())
        );

        // UTF8_STRING could not be interned: only STRING is understood.
        assert_eq!(
            PropertyValue::decode(WatchedProperty::NetName, Some(&utf8), ATOM_NONE),
            PropertyValue::Absent
        );
    }

    #[test]
    fn class_splits_on_nul() {
        let raw = RawProperty::new8(ATOM_STRING, &b"xterm\0XTerm\0"[..]);
        assert_eq!(
            PropertyValue::decode(WatchedProperty::Class, Some(&raw), UTF8),
            PropertyValue::Class {
                instance: "xterm".into(),
                class: "XTerm".into()
            }
        );
    }

    #[test]
    fn transient_for_zero_is_none() {
        let raw = RawProperty::new32(ATOM_WINDOW, &[0]);
        assert_eq!(
            PropertyValue::decode(WatchedProperty::TransientFor, Some(&raw), UTF8),
            PropertyValue::Window(None)
        );
        let raw = RawProperty::new32(ATOM_WINDOW, &[0x20_0003]);
        assert_eq!(
            PropertyValue::decode(WatchedProperty::TransientFor, Some(&raw), UTF8),
            PropertyValue::Window(Some(0x20_0003))
        );
    }

    #[test]
    fn size_hints_fields_follow_flags() {
        let mut words = [0_u32; 18];
        words[0] = P_MIN_SIZE | P_RESIZE_INC;
        words[5] = 100;
        words[6] = 50;
        words[7] = 999;
        words[9] = 8;
        words[10] = 16;
        let raw = RawProperty::new32(ATOM_WM_NORMAL_HINTS, &words);

        let PropertyValue::SizeHints(hints) =
            PropertyValue::decode(WatchedProperty::NormalHints, Some(&raw), UTF8)
        else {
            panic!("expected size hints");
        };
        assert_eq!(hints.min_width, Some(100));
        assert_eq!(hints.max_width, None);
        assert_eq!(hints.width_increment, Some(8));
        assert_eq!(hints.base_width, Some(100));
        assert_eq!(hints.base_height, Some(50));
    }

    #[test]
    fn oversized_hints_are_clamped() {
        let mut words = [0_u32; 18];
        words[0] = P_MIN_SIZE | P_MAX_SIZE;
        words[5] = u32::MAX;
        words[6] = 0x8000_0000;
        words[7] = u32::MAX;
        words[8] = 300;
        let raw = RawProperty::new32(ATOM_WM_NORMAL_HINTS, &words);

        let PropertyValue::SizeHints(hints) =
            PropertyValue::decode(WatchedProperty::NormalHints, Some(&raw), UTF8)
        else {
            panic!("expected size hints");
        };
        assert_eq!(hints.min_width, Some(i32::MAX as u32));
        assert_eq!(hints.min_height, Some(i32::MAX as u32));
        assert_eq!(hints.max_width, Some(i32::MAX as u32));
        assert_eq!(hints.max_height, Some(300));
    }

    #[test]
    fn motif_decorations() {
        let raw = RawProperty::new32(400, &[MWM_HINTS_DECORATIONS, 0, 0, 0, 0]);
        assert_eq!(
            PropertyValue::decode(WatchedProperty::Motif, Some(&raw), UTF8),
            PropertyValue::Motif(MotifHints {
                decorations: Some(false)
            })
        );
        let raw = RawProperty::new32(400, &[0, 0, 0, 0, 0]);
        assert_eq!(
            PropertyValue::decode(WatchedProperty::Motif, Some(&raw), UTF8),
            PropertyValue::Motif(MotifHints { decorations: None })
        );
    }

    #[test]
    fn missing_or_mistyped_is_absent() {
        assert_eq!(
            PropertyValue::decode(WatchedProperty::Protocols, None, UTF8),
            PropertyValue::Absent
        );
        let wrong = RawProperty::new8(ATOM_STRING, "nope");
        assert_eq!(
            PropertyValue::decode(WatchedProperty::Protocols, Some(&wrong), UTF8),
            PropertyValue::Absent
        );
    }
}
