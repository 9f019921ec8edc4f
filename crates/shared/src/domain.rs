use std::{fmt, str::FromStr, sync::Arc};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Largest image the remote service accepts (10 MiB).
pub const MAX_INPUT_BYTES: u64 = 10_485_760;
pub const DEFAULT_PIXEL_SIZE: i64 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

macro_rules! palette_catalog {
    ($($variant:ident => $name:tt [$($r:literal, $g:literal, $b:literal);+ $(;)?]),+ $(,)?) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum PaletteId {
            $(
                #[serde(rename = $name)]
                $variant,
            )+
        }

        impl PaletteId {
            pub const ALL: &'static [PaletteId] = &[$(PaletteId::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $(PaletteId::$variant => $name,)+
                }
            }

            pub fn colors(self) -> [Rgb; 4] {
                match self {
                    $(PaletteId::$variant => [$(Rgb($r, $g, $b)),+],)+
                }
            }
        }

        impl FromStr for PaletteId {
            type Err = PaletteParseError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value {
                    $($name => Ok(PaletteId::$variant),)+
                    other => Err(PaletteParseError(other.to_string())),
                }
            }
        }
    };
}

palette_catalog! {
    Demichrome => "2bit_demichrome" [33, 30, 32; 85, 85, 104; 160, 160, 139; 233, 239, 236],
    Bicycle => "bicycle" [22, 22, 22; 171, 70, 70; 143, 155, 246; 240, 240, 240],
    NeonNightSky => "neon_night_sky" [19, 22, 38; 76, 76, 127; 230, 161, 207; 255, 230, 234],
    RedBloodPain => "red-blood_pain" [126, 31, 35; 196, 24, 31; 18, 10, 25; 94, 64, 105],
    Matrix => "2_bit_matrix" [242, 255, 242; 173, 217, 188; 91, 140, 124; 13, 26, 26],
    B4sement => "b4sement" [34, 35, 35; 255, 74, 220; 61, 255, 152; 240, 246, 240],
    PumpkinGb => "pumpkin_gb" [20, 43, 35; 25, 105, 44; 224, 110, 22; 247, 219, 126],
    HoneyMilk => "honey_milk" [33, 18, 16; 94, 45, 32; 199, 107, 42; 240, 194, 96],
    Mangavania => "mangavania" [176, 62, 128; 255, 138, 205; 74, 237, 255; 255, 255, 255],
    Daybreak => "daybreak" [8, 5, 12; 130, 45, 48; 235, 117, 77; 248, 181, 129],
    SunsetLattern => "sunset_lattern" [82, 50, 55; 171, 100, 90; 227, 155, 127; 249, 205, 166],
    MorningMist => "morning_mist" [10, 10, 36; 107, 99, 99; 167, 186, 145; 192, 239, 251],
    Hexpress4 => "hexpress4" [85, 56, 64; 155, 104, 89; 190, 188, 106; 237, 248, 200],
    Enamored => "enamored" [248, 243, 253; 250, 198, 180; 218, 41, 142; 46, 43, 18],
    VoltageWarning => "voltage_warning" [28, 20, 18; 99, 86, 80; 211, 174, 33; 212, 201, 195],
}

impl Default for PaletteId {
    fn default() -> Self {
        PaletteId::Demichrome
    }
}

impl fmt::Display for PaletteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown color palette: {0}")]
pub struct PaletteParseError(pub String);

/// A chosen image file. Replaced wholesale on every new selection.
#[derive(Debug, Clone)]
pub struct SubmissionInput {
    file_name: String,
    mime_type: String,
    bytes: Arc<[u8]>,
}

impl SubmissionInput {
    pub fn new(
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: impl Into<Arc<[u8]>>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            bytes: bytes.into(),
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn bytes(&self) -> &Arc<[u8]> {
        &self.bytes
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_image(&self) -> bool {
        self.mime_type
            .trim()
            .to_ascii_lowercase()
            .strip_prefix("image/")
            .is_some_and(|subtype| !subtype.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameters {
    pub palette: PaletteId,
    pub pixel_size: i64,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            palette: PaletteId::default(),
            pixel_size: DEFAULT_PIXEL_SIZE,
        }
    }
}

impl Parameters {
    pub fn new(palette: PaletteId, pixel_size: i64) -> Self {
        Self {
            palette,
            pixel_size,
        }
    }

    pub fn with_pixel_size_entry(palette: PaletteId, entry: &str) -> Self {
        Self::new(palette, normalize_pixel_size_entry(entry))
    }

    /// Clamps non-positive pixel sizes to 1.
    pub fn normalized(self) -> Self {
        Self {
            pixel_size: self.pixel_size.max(1),
            ..self
        }
    }
}

/// Turns free-text pixel size input into a usable value; anything that is not
/// a positive number becomes 1.
pub fn normalize_pixel_size_entry(entry: &str) -> i64 {
    let entry = entry.trim();
    let parsed = entry.parse::<i64>().ok().or_else(|| {
        entry
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
            .map(|value| value.round() as i64)
    });
    match parsed {
        Some(value) if value >= 1 => value,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_names_round_trip_through_catalog() {
        for palette in PaletteId::ALL {
            assert_eq!(palette.as_str().parse::<PaletteId>(), Ok(*palette));
        }
        assert_eq!(PaletteId::ALL.len(), 15);
    }

    #[test]
    fn unknown_palette_name_is_rejected() {
        let err = "2bit_demichrom".parse::<PaletteId>().expect_err("must fail");
        assert_eq!(err, PaletteParseError("2bit_demichrom".into()));
    }

    #[test]
    fn palette_serializes_as_wire_name() {
        let json = serde_json::to_string(&PaletteId::RedBloodPain).expect("serialize");
        assert_eq!(json, "\"red-blood_pain\"");
        let parsed: PaletteId = serde_json::from_str("\"2_bit_matrix\"").expect("deserialize");
        assert_eq!(parsed, PaletteId::Matrix);
    }

    #[test]
    fn default_palette_is_demichrome() {
        assert_eq!(PaletteId::default().as_str(), "2bit_demichrome");
        assert_eq!(
            PaletteId::default().colors()[3],
            Rgb(233, 239, 236)
        );
    }

    #[test]
    fn pixel_size_entry_normalizes_to_positive() {
        assert_eq!(normalize_pixel_size_entry("-5"), 1);
        assert_eq!(normalize_pixel_size_entry(""), 1);
        assert_eq!(normalize_pixel_size_entry("abc"), 1);
        assert_eq!(normalize_pixel_size_entry("0"), 1);
        assert_eq!(normalize_pixel_size_entry(" 8 "), 8);
        assert_eq!(normalize_pixel_size_entry("3.6"), 4);
    }

    #[test]
    fn normalized_parameters_clamp_pixel_size() {
        let params = Parameters::new(PaletteId::Bicycle, -3).normalized();
        assert_eq!(params.pixel_size, 1);
        assert_eq!(params.palette, PaletteId::Bicycle);
    }

    #[test]
    fn image_mime_types_are_recognized() {
        let png = SubmissionInput::new("a.png", "image/png", vec![1u8, 2, 3]);
        assert!(png.is_image());
        assert_eq!(png.size(), 3);
        let text = SubmissionInput::new("a.txt", "text/plain", Vec::<u8>::new());
        assert!(!text.is_image());
        let bare = SubmissionInput::new("a", "image/", Vec::<u8>::new());
        assert!(!bare.is_image());
    }
}
