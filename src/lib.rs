/*!
# Pressure Graph

Generates, renders and exports pressure-test profiles, with a small web
service that keeps a per-user history of generated graphs.

## Overview

A pressure test is described by a start and end instant, a working pressure,
a hold duration at that pressure, and any number of intermediate stages. Each
stage rises to its own pressure, holds for a while (optionally drifting
towards a bound), and is then depressurized to a target pressure. From this
sparse description the generator synthesizes a dense, time-ordered series of
pressure samples with realistic noise, which can be drawn as a chart or
exported.

## Architecture

### Core
- **settings**: `TestSettings`/`PressureStage` and date/time resolution
- **noise**: uniform noise helper with an injectable RNG
- **generator**: piecewise profile synthesis (ramps, holds, drift), sorting
  and de-duplication
- **validation**: field-level checks that collect every error in a submission
- **saving**: gzip+bincode settings storage and per-user history index
- **config**: server settings from defaults, environment and arguments

### Output
- **render**: plotters charts as PNG or SVG with a 5% time buffer and a
  pressure axis rounded up to a multiple of 5
- **downloader**: CSV/XLSX point export, JSON settings export/import

### Web Layer (feature `web`)
- **login**: argon2 password hashes, cookie sessions, auth middleware
- **app**: axum routes for generation, export and history

## REST API Endpoints

- `POST /api/graph` - Generates points for submitted settings
- `POST /api/export?format=png|svg|json|csv|xlsx` - Downloads an export
- `GET /api/history` - Lists the logged-in user's graphs
- `GET|DELETE /api/history/{id}` - Reads or removes a history entry
- `GET /api/history/{id}/export?format=` - Re-exports a stored graph
- `POST /api/register`, `/api/login`, `/api/logout` - Authentication
*/

pub mod config;
pub mod downloader;
pub mod error;
pub mod generator;
pub mod noise;
pub mod saving;
pub mod settings;
pub mod validation;

#[cfg(feature = "web")]
pub mod app;
#[cfg(feature = "web")]
pub mod login;
#[cfg(feature = "web")]
pub mod render;

pub use downloader::ExportFormat;
pub use error::{GraphError, GraphResult};
pub use generator::{DataPoint, GraphData, generate, generate_with_rng};
pub use settings::{PressureStage, TestSettings, TestSettingsForm};
pub use validation::{FieldError, ValidationErrors, validate_form};
