use image::GenericImageView;
use optimg::config::ImageFormat;
use optimg::transform::{decode_image, encode_image, resize_to_width, transcode};

#[test]
fn resize_caps_width_and_rounds_height() {
    let img = image::DynamicImage::new_rgb8(800, 600);
    let out = resize_to_width(img, 400);
    assert_eq!(out.dimensions(), (400, 300));

    // round(333 * 500 / 1000) = round(166.5) = 167
    let img = image::DynamicImage::new_rgb8(1000, 333);
    let out = resize_to_width(img, 500);
    assert_eq!(out.dimensions(), (500, 167));
}

#[test]
fn resize_is_noop_at_or_under_bound() {
    let img = image::DynamicImage::new_rgb8(400, 300);
    let out = resize_to_width(img, 400);
    assert_eq!(out.dimensions(), (400, 300));

    let img = image::DynamicImage::new_rgb8(200, 150);
    let out = resize_to_width(img, 400);
    assert_eq!(out.dimensions(), (200, 150));
}

#[test]
fn jpeg_encode_drops_alpha() {
    let img = image::DynamicImage::new_rgba8(64, 48);
    let out = encode_image(&img, ImageFormat::jpeg, 80).unwrap();
    assert!(!out.is_empty());

    let decoded = decode_image(&out).unwrap();
    assert_eq!(decoded.dimensions(), (64, 48));
    assert!(!decoded.color().has_alpha());
}

#[test]
fn webp_encode_keeps_alpha() {
    let img = image::DynamicImage::new_rgba8(32, 32);
    let out = encode_image(&img, ImageFormat::webp, 75).unwrap();
    assert!(!out.is_empty());

    let decoded = decode_image(&out).unwrap();
    assert_eq!(decoded.dimensions(), (32, 32));
    assert!(decoded.color().has_alpha());
}

#[test]
fn decode_rejects_non_image_bytes() {
    assert!(decode_image(b"this is a text file, not an image").is_err());
}

#[test]
fn transcode_png_to_jpeg_resizes_and_flattens() {
    let img = image::DynamicImage::new_rgba8(640, 480);
    let mut png = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
        .unwrap();

    let out = transcode(&png, 320, 80, ImageFormat::jpeg).unwrap();

    let decoded = decode_image(&out).unwrap();
    assert_eq!(decoded.dimensions(), (320, 240));
    assert!(!decoded.color().has_alpha());
}

#[test]
fn transcode_is_deterministic() {
    let img = image::DynamicImage::new_rgb8(256, 128);
    let mut png = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
        .unwrap();

    let first = transcode(&png, 100, 75, ImageFormat::webp).unwrap();
    let second = transcode(&png, 100, 75, ImageFormat::webp).unwrap();
    assert_eq!(first, second);
}
