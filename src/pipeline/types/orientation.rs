use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::str::FromStr;

/// Physical orientation of the device when a frame was captured.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceOrientation {
    #[default]
    Portrait,
    LandscapeLeft,
    LandscapeRight,
    PortraitUpsideDown,
    Unknown,
}

impl FromStr for DeviceOrientation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "portrait" => Ok(Self::Portrait),
            "landscape-left" => Ok(Self::LandscapeLeft),
            "landscape-right" => Ok(Self::LandscapeRight),
            "portrait-upside-down" => Ok(Self::PortraitUpsideDown),
            "unknown" => Ok(Self::Unknown),
            other => Err(format!("unknown device orientation '{other}'")),
        }
    }
}

/// Orientation of the raw sensor buffer relative to upright, as handed to
/// the recognition engine. Buffers are always captured in the sensor's
/// fixed orientation, so the device orientation decides how to read them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageOrientation {
    Up,
    Down,
    Left,
    Right,
}

impl From<DeviceOrientation> for ImageOrientation {
    fn from(orientation: DeviceOrientation) -> Self {
        match orientation {
            DeviceOrientation::Portrait => ImageOrientation::Right,
            DeviceOrientation::LandscapeLeft => ImageOrientation::Up,
            DeviceOrientation::LandscapeRight => ImageOrientation::Down,
            DeviceOrientation::PortraitUpsideDown => ImageOrientation::Left,
            DeviceOrientation::Unknown => ImageOrientation::Right,
        }
    }
}

impl ImageOrientation {
    /// Rotates the buffer so that its content reads upright.
    pub fn upright<'a>(self, image: &'a DynamicImage) -> Cow<'a, DynamicImage> {
        match self {
            ImageOrientation::Up => Cow::Borrowed(image),
            ImageOrientation::Right => Cow::Owned(image.rotate90()),
            ImageOrientation::Down => Cow::Owned(image.rotate180()),
            ImageOrientation::Left => Cow::Owned(image.rotate270()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Luma};

    #[test]
    fn device_orientation_maps_to_recognition_orientation() {
        assert_eq!(
            ImageOrientation::from(DeviceOrientation::Portrait),
            ImageOrientation::Right
        );
        assert_eq!(
            ImageOrientation::from(DeviceOrientation::LandscapeLeft),
            ImageOrientation::Up
        );
        assert_eq!(
            ImageOrientation::from(DeviceOrientation::LandscapeRight),
            ImageOrientation::Down
        );
        assert_eq!(
            ImageOrientation::from(DeviceOrientation::PortraitUpsideDown),
            ImageOrientation::Left
        );
        assert_eq!(
            ImageOrientation::from(DeviceOrientation::Unknown),
            ImageOrientation::Right
        );
    }

    #[test]
    fn upright_swaps_dimensions_for_quarter_turns() {
        let image = DynamicImage::ImageLuma8(ImageBuffer::from_pixel(4, 2, Luma([0u8])));

        let up = ImageOrientation::Up.upright(&image);
        assert!(matches!(up, Cow::Borrowed(_)));
        assert_eq!((up.width(), up.height()), (4, 2));

        let right = ImageOrientation::Right.upright(&image);
        assert_eq!((right.width(), right.height()), (2, 4));

        let down = ImageOrientation::Down.upright(&image);
        assert_eq!((down.width(), down.height()), (4, 2));
    }

    #[test]
    fn parses_orientation_names() {
        assert_eq!(
            "landscape-left".parse::<DeviceOrientation>(),
            Ok(DeviceOrientation::LandscapeLeft)
        );
        assert!("sideways".parse::<DeviceOrientation>().is_err());
    }
}
