// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Shared test doubles for batch pipeline tests
#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use catalog_ocr::fetch::{FetchError, ImageFetcher};
use catalog_ocr::vision::ocr::{PageReader, RegionReader, RegionText};
use catalog_ocr::vision::PreprocessedImage;
use image::{DynamicImage, ImageFormat};
use std::collections::HashMap;
use std::io::Cursor;
use std::time::Duration;

/// Encode a small valid PNG for rows that should decode successfully
pub fn png_bytes() -> Vec<u8> {
    let img = DynamicImage::new_rgb8(8, 8);
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .expect("png encoding");
    bytes
}

/// Per-URL scripted fetch behavior
#[derive(Clone)]
pub enum FetchScript {
    /// Return valid PNG bytes after an optional delay
    Bytes { delay_ms: u64 },
    /// Return bytes that are not an image
    Garbage,
    /// Non-200 response
    Status(u16),
    /// Never completes within any reasonable row timeout
    Stall,
}

/// Scripted fetcher keyed by URL
pub struct ScriptedFetcher {
    scripts: HashMap<String, FetchScript>,
}

impl ScriptedFetcher {
    pub fn new<I>(scripts: I) -> Self
    where
        I: IntoIterator<Item = (String, FetchScript)>,
    {
        Self {
            scripts: scripts.into_iter().collect(),
        }
    }
}

#[async_trait]
impl ImageFetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        match self.scripts.get(url) {
            Some(FetchScript::Bytes { delay_ms }) => {
                if *delay_ms > 0 {
                    tokio::time::sleep(Duration::from_millis(*delay_ms)).await;
                }
                Ok(png_bytes())
            }
            Some(FetchScript::Garbage) => Ok(vec![0u8; 32]),
            Some(FetchScript::Status(code)) => Err(FetchError::Status(*code, url.to_string())),
            Some(FetchScript::Stall) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(png_bytes())
            }
            None => Err(FetchError::Http(format!("unscripted url: {url}"))),
        }
    }
}

/// Region engine double that yields no spans
pub struct EmptyRegions;

impl RegionReader for EmptyRegions {
    fn read_regions(&self, _image: &PreprocessedImage) -> Result<Vec<RegionText>> {
        Ok(Vec::new())
    }
}

/// Page engine double that always reads the same block
pub struct FixedPage(pub String);

impl PageReader for FixedPage {
    fn read_page(&self, _image: &PreprocessedImage) -> Result<String> {
        Ok(self.0.clone())
    }
}
