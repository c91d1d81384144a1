use std::fmt;

/// Display colors handed out to recordings, in allocation order.
pub const PALETTE: [Color; 8] = [
    Color("#FF6B6B"),
    Color("#4ECDC4"),
    Color("#45B7D1"),
    Color("#96CEB4"),
    Color("#FFEAA7"),
    Color("#DDA0DD"),
    Color("#98D8C8"),
    Color("#F7DC6F"),
];

/// A display color as a `#RRGGBB` hex string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color(&'static str);

impl Color {
    /// Hex representation, e.g. `#FF6B6B`.
    pub fn hex(&self) -> &'static str {
        self.0
    }

    /// Red, green and blue components.
    pub fn rgb(&self) -> (u8, u8, u8) {
        let channel = |range: std::ops::Range<usize>| {
            self.0
                .get(range)
                .and_then(|s| u8::from_str_radix(s, 16).ok())
                .unwrap_or(0)
        };
        (channel(1..3), channel(3..5), channel(5..7))
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Round-robin palette cursor.
///
/// The counter only ever grows; the palette index wraps.
#[derive(Debug, Default)]
pub struct ColorAllocator {
    counter: u64,
}

impl ColorAllocator {
    /// Creates an allocator positioned at the first palette entry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next palette color and advances the cursor.
    pub fn next_color(&mut self) -> Color {
        let color = PALETTE[(self.counter % PALETTE.len() as u64) as usize];
        self.counter = self.counter.wrapping_add(1);
        color
    }

    /// Number of colors handed out so far.
    pub fn allocated(&self) -> u64 {
        self.counter
    }
}
