use image::{Rgba, RgbaImage};
use std::fs;
use std::path::{Path, PathBuf};

use sheet_packer_core::io::{FrameImageSource, MemorySink};
use sheet_packer_core::loader::{ProcessedFrames, frame_path, load_png_definition, strip_definition};
use sheet_packer_core::model::Rect;

fn scratch_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("sheet-packer-{tag}-{}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

/// 3 frames of 8x8: a 2x3 dot at (1,2), an empty cell, a full cell.
fn strip() -> RgbaImage {
    let mut img = RgbaImage::new(24, 8);
    for y in 2..5 {
        for x in 1..3 {
            img.put_pixel(x, y, Rgba([255, 255, 0, 255]));
        }
    }
    for y in 0..8 {
        for x in 16..24 {
            img.put_pixel(x, y, Rgba([0, 0, 255, 128]));
        }
    }
    img
}

#[test]
fn strip_frames_are_cropped_to_content() {
    let (def, frames) = strip_definition("walk", &strip(), 3).unwrap();
    assert_eq!(def.filename, "walk.txt");
    assert_eq!((def.sprite_width, def.sprite_height), (8, 8));
    assert_eq!(def.frame_rects, [Rect::new(1, 2, 2, 3), Rect::new(0, 0, 1, 1), Rect::new(0, 0, 8, 8)]);
    assert_eq!(frames[0].dimensions(), (2, 3));
    assert_eq!(frames[1].dimensions(), (1, 1));
    assert_eq!(frames[2].get_pixel(7, 7).0, [0, 0, 255, 128]);
}

#[test]
fn strip_needs_room_for_every_frame() {
    assert!(strip_definition("walk", &strip(), 0).is_err());
    assert!(strip_definition("walk", &strip(), 25).is_err());
}

#[test]
fn png_with_companion_loads_as_strip() {
    let dir = scratch_dir("strip");
    let png = dir.join("walk.png");
    strip().save(&png).unwrap();
    fs::write(dir.join("walk.pngdef"), "3\n").unwrap();

    let process = Path::new("process");
    let mut sink = MemorySink::new();
    let def = load_png_definition(&png, process, &mut sink).unwrap();
    assert_eq!(def.frame_count(), 3);
    assert!(sink.get(frame_path(process, "walk", 2)).is_some());

    let frames = ProcessedFrames::new(sink, process);
    let first = frames.load_frame(&def, 0).unwrap();
    assert_eq!(first.dimensions(), (2, 3));
    assert_eq!(first.get_pixel(0, 0).0, [255, 255, 0, 255]);
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn plain_png_is_one_uncropped_frame() {
    let dir = scratch_dir("plain");
    let png = dir.join("coin.png");
    let mut img = RgbaImage::new(6, 4);
    img.put_pixel(3, 1, Rgba([9, 9, 9, 255]));
    img.save(&png).unwrap();

    let mut sink = MemorySink::new();
    let def = load_png_definition(&png, Path::new("p"), &mut sink).unwrap();
    assert_eq!(def.filename, "coin.txt");
    assert_eq!(def.frame_rects, [Rect::new(0, 0, 6, 4)]);
    assert_eq!(sink.files.len(), 1);
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn frames_of_similar_names_stay_separate() {
    let dir = scratch_dir("names");
    let red = Rgba([255, 0, 0, 255]);
    let blue = Rgba([0, 0, 255, 255]);
    RgbaImage::from_pixel(22, 2, red).save(dir.join("hero.png")).unwrap();
    fs::write(dir.join("hero.pngdef"), "11").unwrap();
    RgbaImage::from_pixel(2, 2, blue).save(dir.join("hero1.png")).unwrap();

    let process = Path::new("process");
    let mut sink = MemorySink::new();
    let hero = load_png_definition(&dir.join("hero.png"), process, &mut sink).unwrap();
    let hero1 = load_png_definition(&dir.join("hero1.png"), process, &mut sink).unwrap();
    assert_eq!(sink.files.len(), 12);

    let frames = ProcessedFrames::new(sink, process);
    assert_eq!(frames.load_frame(&hero, 10).unwrap().get_pixel(0, 0), &red);
    assert_eq!(frames.load_frame(&hero1, 0).unwrap().get_pixel(0, 0), &blue);
    let _ = fs::remove_dir_all(&dir);
}
