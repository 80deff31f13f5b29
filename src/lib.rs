/*!
# Stock Viewer

A browser-based stock-price dashboard built in Rust.

## Overview

The application lets a user watch stock prices on a small set of pages
served from one axum process. Prices come from a public chart API, uploaded
CSV files are kept on disk with their metadata in a JSON document store, and
a personal ticker list can be exported or kept in a cookie.

## Architecture

### Frontend Layer
- **Technologies**: HTML, CSS, a few lines of inline JavaScript
- A sidebar built from the routing table plus one page at a time

### Backend Layer
- **Technologies**: Rust, axum, tokio
- **Core Components**:
  - Record Store - file metadata persisted as a JSON document (`store`)
  - CSV Ingestion - upload name validation, copy and cleanup (`ingest`)
  - Chart Assembly - traces from stored CSV columns (`chart`) drawn with plotters (`render`)
  - Market Data - price history with caching and rate-limit retries (`market`, `quotes`)
  - Authentication - username/password rows from a CSV file or a published sheet (`auth`, `sheets`)
  - Session Context - per-browser state kept by the server (`session`)

## Modules

- **config**: Settings read from the environment
- **error**: Crate-wide error type
- **store**: File record store
- **ingest**: CSV upload ingestion
- **chart**: Chart model and assembly
- **market**: Periods, price series and volatility
- **forecast**: Linear trend forecast of closing prices
- **ticker_list**: User ticker list with TOML/JSON export
- **auth**: Login checks
- **contact**: Contact form validation and submission
- **router**: Routing table
- **quotes**, **sheets**, **session**, **render**, **qr**, **pages**, **app**: web layer

## REST API Endpoints

- `/page/{key}` - Renders a page from the routing table
- `/api/login`, `/api/logout` - Session authentication
- `/api/tickers` - Ticker list management and export
- `/api/quotes` - Price series, charts and forecasts
- `/api/jp/{code}` - Japanese price series, charts, CSV downloads and forecasts
- `/api/files` - Upload, list and delete stored CSV files
- `/api/chart` - Chart over stored CSV files
- `/api/qr` - QR code images
*/

pub mod auth;
pub mod chart;
pub mod config;
pub mod contact;
pub mod error;
pub mod forecast;
pub mod ingest;
pub mod market;
pub mod router;
pub mod store;
pub mod ticker_list;

#[cfg(feature = "web")]
pub mod app;
#[cfg(feature = "web")]
pub mod pages;
#[cfg(feature = "web")]
pub mod qr;
#[cfg(feature = "web")]
pub mod quotes;
#[cfg(feature = "web")]
pub mod render;
#[cfg(feature = "web")]
pub mod session;
#[cfg(feature = "web")]
pub mod sheets;

pub use config::Settings;
pub use error::{Error, Result};
pub use store::{FileRecord, NewFileRecord, RecordStore};
