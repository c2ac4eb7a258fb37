use ratatui::style::Color;

// Color palette structure
#[derive(Clone, Debug)]
pub struct Base16Palette {
    pub base_00: Color, // Background
    pub base_01: Color, // Lighter background
    pub base_02: Color, // Selection background
    pub base_03: Color, // Comments, invisibles
    pub base_04: Color, // Dark foreground
    pub base_05: Color, // Default foreground
    pub base_06: Color, // Light foreground
    pub base_07: Color, // Light background
    pub base_08: Color, // Red
    pub base_09: Color, // Orange
    pub base_0a: Color, // Yellow
    pub base_0b: Color, // Green
    pub base_0c: Color, // Cyan
    pub base_0d: Color, // Blue
    pub base_0e: Color, // Purple
    pub base_0f: Color, // Brown
}

const fn rgb(hex: u32) -> Color {
    Color::Rgb((hex >> 16) as u8, (hex >> 8) as u8, hex as u8)
}

// Paper: warm light theme for daytime reading
static PAPER_PALETTE: Base16Palette = Base16Palette {
    base_00: rgb(0xFAF7F0),
    base_01: rgb(0xEFE9DC),
    base_02: rgb(0xE0D7C3),
    base_03: rgb(0xA39B8B),
    base_04: rgb(0x6F685C),
    base_05: rgb(0x3B3630),
    base_06: rgb(0x27231F),
    base_07: rgb(0x141210),
    base_08: rgb(0xB3473A),
    base_09: rgb(0xC46A2B),
    base_0a: rgb(0xA8841C),
    base_0b: rgb(0x5E8C3A),
    base_0c: rgb(0x3E8A84),
    base_0d: rgb(0x3D6E9E),
    base_0e: rgb(0x8A5A9E),
    base_0f: rgb(0x8C6243),
};

// Oceanic Next, used for dark mode
static OCEANIC_NEXT_PALETTE: Base16Palette = Base16Palette {
    base_00: rgb(0x1B2B34),
    base_01: rgb(0x343D46),
    base_02: rgb(0x4F5B66),
    base_03: rgb(0x65737E),
    base_04: rgb(0xA7ADBA),
    base_05: rgb(0xC0C5CE),
    base_06: rgb(0xCDD3DE),
    base_07: rgb(0xF0F4F8),
    base_08: rgb(0xEC5F67),
    base_09: rgb(0xF99157),
    base_0a: rgb(0xFAC863),
    base_0b: rgb(0x99C794),
    base_0c: rgb(0x5FB3B3),
    base_0d: rgb(0x6699CC),
    base_0e: rgb(0xC594C5),
    base_0f: rgb(0xAB7967),
};

pub fn palette(dark_mode: bool) -> &'static Base16Palette {
    if dark_mode {
        &OCEANIC_NEXT_PALETTE
    } else {
        &PAPER_PALETTE
    }
}

// Color utilities for focus states
impl Base16Palette {
    /// Text, border and background colors for a panel
    pub fn get_panel_colors(&self, is_focused: bool) -> (Color, Color, Color) {
        if is_focused {
            (self.base_05, self.base_0d, self.base_00)
        } else {
            (self.base_04, self.base_03, self.base_00)
        }
    }

    /// Selection background and foreground
    pub fn get_selection_colors(&self, is_focused: bool) -> (Color, Color) {
        if is_focused {
            (self.base_02, self.base_06)
        } else {
            (self.base_01, self.base_04)
        }
    }

    /// Color of a page that is still rendering
    pub fn skeleton(&self) -> Color {
        self.base_01
    }

    /// Border of the highlighted page in scroll mode
    pub fn highlight(&self) -> Color {
        self.base_0d
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgb_splits_channels() {
        assert_eq!(rgb(0x1B2B34), Color::Rgb(0x1B, 0x2B, 0x34));
    }

    #[test]
    fn dark_and_light_palettes_differ() {
        assert_ne!(palette(true).base_00, palette(false).base_00);
    }
}
