use image::{imageops, DynamicImage, GrayImage};

/// 3x3 Gaussian kernel (σ derived from the kernel size, as OpenCV does for 3x3)
const GAUSSIAN_3X3: [f32; 9] = [1.0, 2.0, 1.0, 2.0, 4.0, 2.0, 1.0, 2.0, 1.0];

/// Prepare an image for the recognition engine: luminance, inverted polarity
/// (dark-on-light text becomes light-on-dark), then a 3x3 blur against sensor
/// noise. Always in that order.
pub fn normalize(image: &DynamicImage) -> GrayImage {
    let mut gray = image.to_luma8();
    imageops::invert(&mut gray);
    blur_3x3(&gray)
}

/// `filter3x3` leaves a one-pixel frame untouched, so filter a copy padded by
/// edge replication and cut the frame back off.
fn blur_3x3(gray: &GrayImage) -> GrayImage {
    let (w, h) = gray.dimensions();
    if w == 0 || h == 0 {
        return gray.clone();
    }

    let padded = GrayImage::from_fn(w + 2, h + 2, |x, y| {
        *gray.get_pixel(x.saturating_sub(1).min(w - 1), y.saturating_sub(1).min(h - 1))
    });
    // filter3x3 divides by the kernel sum
    let blurred: GrayImage = imageops::filter3x3(&padded, &GAUSSIAN_3X3);
    imageops::crop_imm(&blurred, 1, 1, w, h).to_image()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb, RgbImage};

    #[test]
    fn test_output_is_single_channel_same_size() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(40, 12));
        let out = normalize(&img);
        assert_eq!(out.dimensions(), (40, 12));
    }

    #[test]
    fn test_polarity_is_inverted() {
        let white = DynamicImage::ImageRgb8(RgbImage::from_pixel(5, 5, Rgb([255, 255, 255])));
        let out = normalize(&white);
        assert_eq!(out.get_pixel(2, 2), &Luma([0u8]));

        let black = DynamicImage::ImageRgb8(RgbImage::from_pixel(5, 5, Rgb([0, 0, 0])));
        let out = normalize(&black);
        assert_eq!(out.get_pixel(2, 2), &Luma([255u8]));
        // Borders are blurred with replicated edges, not left black
        assert_eq!(out.get_pixel(0, 0), &Luma([255u8]));
        assert_eq!(out.get_pixel(4, 4), &Luma([255u8]));
    }

    #[test]
    fn test_blur_spreads_a_single_dot() {
        // One dark pixel on white becomes one bright pixel after inversion,
        // then gets smeared across its 3x3 neighbourhood
        let mut img = GrayImage::from_pixel(5, 5, Luma([255u8]));
        img.put_pixel(2, 2, Luma([0u8]));
        let out = normalize(&DynamicImage::ImageLuma8(img));

        let center = out.get_pixel(2, 2)[0];
        let edge = out.get_pixel(1, 2)[0];
        let corner = out.get_pixel(1, 1)[0];
        let outside = out.get_pixel(0, 0)[0];

        assert!(center > edge && edge > corner && corner > outside);
        assert_eq!(outside, 0);
        // 255 * 4/16
        assert!((center as i32 - 64).abs() <= 1);
    }

    #[test]
    fn test_tiny_images() {
        let one = DynamicImage::ImageRgb8(RgbImage::from_pixel(1, 1, Rgb([0, 0, 0])));
        assert_eq!(normalize(&one).get_pixel(0, 0), &Luma([255u8]));

        let empty = DynamicImage::ImageRgb8(RgbImage::new(0, 0));
        assert_eq!(normalize(&empty).dimensions(), (0, 0));
    }

    #[test]
    fn test_normalize_is_pure() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(3, 3, Rgb([10, 200, 30])));
        let before = img.clone();
        let a = normalize(&img);
        let b = normalize(&img);
        assert_eq!(a, b);
        assert_eq!(img, before);
    }
}
