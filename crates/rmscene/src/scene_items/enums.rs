//! Pen, colour and paragraph-style codes.
//!
//! Each enum keeps an `Unknown` arm so codes written by newer firmware are
//! carried through unchanged.

use serde::{Deserialize, Serialize};

macro_rules! code_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident : $repr:ty {
            $($variant:ident = $code:literal,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $($variant,)+
            Unknown($repr),
        }

        impl $name {
            pub fn from_code(code: $repr) -> Self {
                match code {
                    $($code => Self::$variant,)+
                    other => Self::Unknown(other),
                }
            }

            pub fn code(self) -> $repr {
                match self {
                    $(Self::$variant => $code,)+
                    Self::Unknown(other) => other,
                }
            }
        }
    };
}

code_enum! {
    /// Drawing tool of a stroke.
    pub enum Pen: u32 {
        Paintbrush1 = 0,
        Pencil1 = 1,
        Ballpoint1 = 2,
        Marker1 = 3,
        Fineliner1 = 4,
        Highlighter1 = 5,
        Eraser = 6,
        MechanicalPencil1 = 7,
        EraserArea = 8,
        Paintbrush2 = 12,
        MechanicalPencil2 = 13,
        Pencil2 = 14,
        Ballpoint2 = 15,
        Marker2 = 16,
        Fineliner2 = 17,
        Highlighter2 = 18,
        Calligraphy = 21,
        Shader = 23,
    }
}

impl Pen {
    pub fn is_highlighter(self) -> bool {
        matches!(self, Pen::Highlighter1 | Pen::Highlighter2)
    }
}

code_enum! {
    /// Stroke or highlight colour.
    ///
    /// The raw code is kept as-is; firmware-specific remapping of
    /// highlighter colours is left to renderers.
    pub enum PenColor: u32 {
        Black = 0,
        Gray = 1,
        White = 2,
        Yellow = 3,
        Green = 4,
        Pink = 5,
        Blue = 6,
        Red = 7,
        GrayOverlap = 8,
        Highlight = 9,
        Green2 = 10,
        Cyan = 11,
        Magenta = 12,
        Yellow2 = 13,
    }
}

code_enum! {
    /// Block-level style of a text paragraph.
    pub enum ParagraphStyle: u8 {
        Basic = 0,
        Plain = 1,
        Heading = 2,
        Bold = 3,
        Bullet = 4,
        Bullet2 = 5,
        Checkbox = 6,
        CheckboxChecked = 7,
    }
}

impl Default for ParagraphStyle {
    fn default() -> Self {
        ParagraphStyle::Plain
    }
}

impl ParagraphStyle {
    /// Marker put in front of the paragraph when rendered as plain text.
    pub fn prefix(self) -> &'static str {
        match self {
            ParagraphStyle::Heading => "# ",
            ParagraphStyle::Bold => "## ",
            ParagraphStyle::Bullet => "- ",
            ParagraphStyle::Bullet2 => "  - ",
            ParagraphStyle::Checkbox => "- [ ] ",
            ParagraphStyle::CheckboxChecked => "- [x] ",
            _ => "",
        }
    }
}
