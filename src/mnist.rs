use braille_rs::BrailleChar;
use log::{debug, info, warn};
use nalgebra::DVector;
use std::{
    fs::File,
    io::{BufReader, ErrorKind, Read},
    path::Path,
};

use crate::error::{Error, Result};

pub const IMAGE_MAGIC: u32 = 2051;
pub const LABEL_MAGIC: u32 = 2049;

pub const ROWS: usize = 28;
pub const COLS: usize = 28;
pub const IMAGE_SIZE: usize = ROWS * COLS;

/// Leading fields shared by MNIST image and label files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub magic: u32,
    pub count: u32,
}

/// A single 28x28 grayscale digit, stored row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pixels: [u8; IMAGE_SIZE],
}

impl Image {
    pub fn new(pixels: [u8; IMAGE_SIZE]) -> Self {
        Self { pixels }
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixel(&self, row: usize, col: usize) -> u8 {
        self.pixels[row * COLS + col]
    }

    /// Pixel intensities scaled into `[0, 1]`.
    pub fn features(&self) -> DVector<f32> {
        DVector::from_iterator(IMAGE_SIZE, self.pixels.iter().map(|&p| p as f32 / 255.))
    }
}

impl TryFrom<&[u8]> for Image {
    type Error = Error;

    fn try_from(bytes: &[u8]) -> Result<Self> {
        let pixels = bytes.try_into().map_err(|_| {
            Error::InvalidArgument(format!(
                "an image needs {IMAGE_SIZE} bytes, got {}",
                bytes.len()
            ))
        })?;

        Ok(Self::new(pixels))
    }
}

/// Reads the magic number and item count, both big-endian.
pub fn read_header<R: Read>(reader: &mut R) -> Result<Header> {
    let magic = read_be_u32(reader)?;
    let count = read_be_u32(reader)?;

    Ok(Header { magic, count })
}

fn read_be_u32<R: Read>(reader: &mut R) -> Result<u32> {
    let mut bytes = [0u8; 4];
    reader.read_exact(&mut bytes)?;

    Ok(u32::from_be_bytes(bytes))
}

fn expect_magic(header: &Header, expected: u32) -> Result<()> {
    if header.magic != expected {
        return Err(Error::BadMagic {
            expected,
            found: header.magic,
        });
    }
    Ok(())
}

/// Reads exactly `expected` bytes. A short payload is an error, never padded.
fn read_payload<R: Read>(reader: &mut R, expected: usize) -> Result<Vec<u8>> {
    let mut payload = Vec::new();
    reader.by_ref().take(expected as u64).read_to_end(&mut payload)?;

    if payload.len() < expected {
        return Err(Error::Truncated {
            expected,
            found: payload.len(),
        });
    }

    let mut extra = [0u8; 1];
    loop {
        match reader.read(&mut extra) {
            Ok(0) => break,
            Ok(_) => {
                warn!("ignoring trailing bytes after {expected} byte payload");
                break;
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!("could not check for trailing bytes: {e}");
                break;
            }
        }
    }

    Ok(payload)
}

pub fn decode_images<R: Read>(mut reader: R) -> Result<Vec<Image>> {
    let header = read_header(&mut reader)?;
    debug!("image header: {header:?}");
    expect_magic(&header, IMAGE_MAGIC)?;

    let rows = read_be_u32(&mut reader)?;
    let cols = read_be_u32(&mut reader)?;
    if rows as usize != ROWS || cols as usize != COLS {
        return Err(Error::BadDimensions { rows, cols });
    }

    let count = header.count as usize;
    let payload = read_payload(&mut reader, count * IMAGE_SIZE)?;

    payload
        .chunks_exact(IMAGE_SIZE)
        .map(Image::try_from)
        .collect()
}

pub fn decode_labels<R: Read>(mut reader: R) -> Result<Vec<u8>> {
    let header = read_header(&mut reader)?;
    debug!("label header: {header:?}");
    expect_magic(&header, LABEL_MAGIC)?;

    read_payload(&mut reader, header.count as usize)
}

pub fn load_images(path: impl AsRef<Path>) -> Result<Vec<Image>> {
    let path = path.as_ref();
    let images = decode_images(BufReader::new(File::open(path)?))?;
    info!("loaded {} images from {}", images.len(), path.display());

    Ok(images)
}

pub fn load_labels(path: impl AsRef<Path>) -> Result<Vec<u8>> {
    let path = path.as_ref();
    let labels = decode_labels(BufReader::new(File::open(path)?))?;
    info!("loaded {} labels from {}", labels.len(), path.display());

    Ok(labels)
}

/// Training and test splits of the MNIST database.
#[derive(Debug, Clone, PartialEq)]
pub struct Mnist {
    pub training_images: Vec<Image>,
    pub training_labels: Vec<u8>,
    pub test_images: Vec<Image>,
    pub test_labels: Vec<u8>,
}

impl Mnist {
    pub fn new(
        training_images: Vec<Image>,
        training_labels: Vec<u8>,
        test_images: Vec<Image>,
        test_labels: Vec<u8>,
    ) -> Result<Self> {
        check_lengths(&training_images, &training_labels)?;
        check_lengths(&test_images, &test_labels)?;

        Ok(Self {
            training_images,
            training_labels,
            test_images,
            test_labels,
        })
    }

    pub fn training_data(&self) -> impl Iterator<Item = (&Image, u8)> {
        self.training_images
            .iter()
            .zip(self.training_labels.iter().copied())
    }

    pub fn test_data(&self) -> impl Iterator<Item = (&Image, u8)> {
        self.test_images.iter().zip(self.test_labels.iter().copied())
    }
}

pub(crate) fn check_lengths(images: &[Image], labels: &[u8]) -> Result<()> {
    if images.len() != labels.len() {
        return Err(Error::LengthMismatch {
            images: images.len(),
            labels: labels.len(),
        });
    }
    Ok(())
}

/// Loads the four standard MNIST files from `dir`.
pub fn read(dir: impl AsRef<Path>) -> Result<Mnist> {
    let dir = dir.as_ref();

    Mnist::new(
        load_images(dir.join("train-images-idx3-ubyte"))?,
        load_labels(dir.join("train-labels-idx1-ubyte"))?,
        load_images(dir.join("t10k-images-idx3-ubyte"))?,
        load_labels(dir.join("t10k-labels-idx1-ubyte"))?,
    )
}

/// Draws the digit with braille characters, two pixels wide and four tall per
/// cell. A pixel is lit when it is at least `threshold`.
pub fn render(image: &Image, threshold: u8) -> String {
    let mut canvas = String::new();

    let grid: Vec<bool> = image.pixels().iter().map(|&p| p >= threshold).collect();

    for line in grid.chunks_exact(COLS * 4) {
        for i in 0..COLS / 2 {
            let left = 2 * i;
            let right = 2 * i + 1;
            let byte = (line[left] as u8)
                | ((line[COLS + left] as u8) << 1)
                | ((line[COLS * 2 + left] as u8) << 2)
                | ((line[COLS * 3 + left] as u8) << 3)
                | ((line[right] as u8) << 4)
                | ((line[COLS + right] as u8) << 5)
                | ((line[COLS * 2 + right] as u8) << 6)
                | ((line[COLS * 3 + right] as u8) << 7);

            canvas.push(BrailleChar::with_data(byte).into())
        }
        canvas.push('\n')
    }

    canvas
}
