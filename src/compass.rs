/// Normalize any angle in degrees into [0, 360).
pub fn normalize_degrees(degrees: f64) -> f64 {
    let normalized = ((degrees % 360.0) + 360.0) % 360.0;
    if normalized >= 360.0 { 0.0 } else { normalized }
}

/// Represents an 8-point compass rose, used to describe which way the
/// arrow points relative to the direction of travel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    N,  // north
    NE, // northeast
    E,  // east
    SE, // southeast
    S,  // south
    SW, // southwest
    W,  // west
    NW, // northwest
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.abbreviation())
    }
}

impl Direction {
    /// Each direction covers 45 degrees (360 / 8), centered on its heading.
    pub fn from_degrees(degrees: f64) -> Self {
        match normalize_degrees(degrees) {
            h if h < 22.5 => Direction::N,
            h if h < 67.5 => Direction::NE,
            h if h < 112.5 => Direction::E,
            h if h < 157.5 => Direction::SE,
            h if h < 202.5 => Direction::S,
            h if h < 247.5 => Direction::SW,
            h if h < 292.5 => Direction::W,
            h if h < 337.5 => Direction::NW,
            _ => Direction::N,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Direction::N => "north",
            Direction::NE => "northeast",
            Direction::E => "east",
            Direction::SE => "southeast",
            Direction::S => "south",
            Direction::SW => "southwest",
            Direction::W => "west",
            Direction::NW => "northwest",
        }
    }

    pub fn abbreviation(&self) -> &'static str {
        match self {
            Direction::N => "N",
            Direction::NE => "NE",
            Direction::E => "E",
            Direction::SE => "SE",
            Direction::S => "S",
            Direction::SW => "SW",
            Direction::W => "W",
            Direction::NW => "NW",
        }
    }

    /// Arrow glyph for a terminal rendering of the pointer.
    pub fn arrow(&self) -> char {
        match self {
            Direction::N => '↑',
            Direction::NE => '↗',
            Direction::E => '→',
            Direction::SE => '↘',
            Direction::S => '↓',
            Direction::SW => '↙',
            Direction::W => '←',
            Direction::NW => '↖',
        }
    }
}
