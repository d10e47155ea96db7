//! # Ensemble persistence and reload
//!
//! One artifact per sky location: a header block carrying the identifying
//! metadata and all summary counters, followed by the time-series records of
//! the surviving observations in original candidate order. The artifact is
//! exclusively owned by the path derived from the location identifier; the
//! pipeline and the reload path both go through that single logical path.
//!
//! ## Overview
//!
//! - [`ArtifactHeader`] / [`EnsembleArtifact`] — on-disk layout.
//! - [`EnsembleArtifact::read`] / [`write`](EnsembleArtifact::write) — I/O,
//!   with [`read_if_exists`](EnsembleArtifact::read_if_exists) backing the
//!   idempotent save short-circuit.
//! - [`ReloadedEnsemble`] — an in-memory pipeline result reconstructed from
//!   an artifact without re-running anything; time-series records come back
//!   as lazy [`StoredLightcurve`] handles.
//! - [`access_lightcurve`] — 1-based good-observation lookup with a
//!   diagnostic plot, degrading to a warning when the artifact is missing.

use std::fs::File;
use std::io::{BufReader, BufWriter};

use camino::{Utf8Path, Utf8PathBuf};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::constants::{Degree, Dex};
use crate::errors::EnsembleError;
use crate::lightcurve::{LightcurveRecord, StoredLightcurve};
use crate::plotting;

/// Header block of a persisted ensemble artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactHeader {
    pub name: Option<String>,
    pub location: Option<String>,
    pub radius_deg: Degree,
    pub log_age: Dex,
    /// Whether the discovery step found any observation at all
    pub has_data: bool,
    pub n_obs_available: usize,
    pub n_good_obs: u32,
    pub n_failed_download: u32,
    pub n_near_edge: u32,
    pub n_scattered_light: u32,
}

impl ArtifactHeader {
    /// Identifier reconstruction: name if present, else location.
    pub fn identifier(&self) -> Result<&str, EnsembleError> {
        self.name
            .as_deref()
            .or(self.location.as_deref())
            .ok_or(EnsembleError::MissingIdentifier)
    }
}

/// A persisted ensemble result: header plus one record per surviving
/// observation, dense and in candidate order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleArtifact {
    pub header: ArtifactHeader,
    pub lightcurves: Vec<LightcurveRecord>,
}

impl EnsembleArtifact {
    /// The single logical artifact path for one location identifier.
    pub fn path_for(lcs_dir: &Utf8Path, identifier: &str) -> Utf8PathBuf {
        lcs_dir.join(format!("{identifier}_output_table.json"))
    }

    /// Read an artifact, failing with [`EnsembleError::ArtifactNotFound`]
    /// when nothing has been persisted at `path`.
    pub fn read(path: &Utf8Path) -> Result<Self, EnsembleError> {
        if !path.is_file() {
            return Err(EnsembleError::ArtifactNotFound(path.to_owned()));
        }
        let reader = BufReader::new(File::open(path.as_std_path())?);
        Ok(serde_json::from_reader(reader)?)
    }

    /// Read an artifact if one exists; `Ok(None)` when it does not.
    ///
    /// Backs the idempotent short-circuit of the save path: a location that
    /// was already persisted is never recomputed or overwritten.
    pub fn read_if_exists(path: &Utf8Path) -> Result<Option<Self>, EnsembleError> {
        if path.is_file() {
            Ok(Some(Self::read(path)?))
        } else {
            Ok(None)
        }
    }

    /// Write the artifact to `path`.
    pub fn write(&self, path: &Utf8Path) -> Result<(), EnsembleError> {
        let writer = BufWriter::new(File::create(path.as_std_path())?);
        serde_json::to_writer(writer, self)?;
        Ok(())
    }
}

/// An ensemble result reconstructed from a persisted artifact.
///
/// Equivalent to the in-memory result of a pipeline run for everything
/// downstream consumers need: metadata, counters, and per-observation
/// lightcurve handles. The handles are lazy; no table is materialized until
/// [`StoredLightcurve::table`] is called.
#[derive(Debug, Clone)]
pub struct ReloadedEnsemble {
    pub header: ArtifactHeader,
    pub identifier: String,
    pub lightcurves: Vec<StoredLightcurve>,
}

impl ReloadedEnsemble {
    /// Reload a persisted ensemble from its artifact.
    ///
    /// Arguments
    /// -----------------
    /// * `path`: the artifact location.
    ///
    /// Return
    /// ----------
    /// * The reconstructed ensemble, or [`EnsembleError::ArtifactNotFound`].
    pub fn read(path: &Utf8Path) -> Result<Self, EnsembleError> {
        let artifact = EnsembleArtifact::read(path)?;
        let identifier = artifact.header.identifier()?.to_string();
        let lightcurves = (0..artifact.lightcurves.len())
            .map(|i| StoredLightcurve::new(path, i))
            .collect();
        Ok(ReloadedEnsemble {
            header: artifact.header,
            identifier,
            lightcurves,
        })
    }
}

/// Look up one stored good observation by 1-based index and render its
/// diagnostic plot.
///
/// With exactly one good observation the index is ignored and the single
/// record returned directly; with several, the record at offset
/// `observation - 1` in candidate order is returned. A missing artifact or
/// an out-of-range index is reported as a warning and yields `Ok(None)`
/// rather than an error.
///
/// Arguments
/// -----------------
/// * `lcs_dir`: directory holding the artifacts.
/// * `figures_dir`: where to render the plot; `None` skips plotting.
/// * `identifier`: the location identifier the artifact was saved under.
/// * `observation`: 1-based good-observation index.
pub fn access_lightcurve(
    lcs_dir: &Utf8Path,
    figures_dir: Option<&Utf8Path>,
    identifier: &str,
    observation: usize,
) -> Result<Option<LightcurveRecord>, EnsembleError> {
    let path = EnsembleArtifact::path_for(lcs_dir, identifier);
    let Some(artifact) = EnsembleArtifact::read_if_exists(&path)? else {
        warn!(
            "no corrected lightcurves at {path}; run the pipeline for {identifier} first"
        );
        return Ok(None);
    };

    let index = if artifact.header.n_good_obs == 1 {
        Some(0)
    } else {
        observation.checked_sub(1)
    };
    let Some(record) = index.and_then(|i| artifact.lightcurves.get(i)) else {
        warn!(
            "{identifier} has {} good observations, none at index {observation}",
            artifact.header.n_good_obs
        );
        return Ok(None);
    };

    if let Some(dir) = figures_dir {
        let figure = plotting::figure_path(dir, identifier, record.sector);
        if let Err(e) = plotting::plot_lightcurve(
            &figure,
            &format!("Observation: {}", record.sector),
            identifier,
            &record.series,
        ) {
            warn!("could not render diagnostic plot for {identifier}: {e}");
        }
    }

    Ok(Some(record.clone()))
}

#[cfg(test)]
mod persistence_tests {
    use super::*;
    use crate::lightcurve::LightcurveSeries;

    fn sample_record(sector: usize) -> LightcurveRecord {
        LightcurveRecord {
            sector,
            series: LightcurveSeries {
                time: vec![0.0, 0.5, 1.0],
                flux: vec![100.0 + sector as f64, 101.0, 99.0],
                flux_err: vec![1.0, 1.0, 1.0],
            },
        }
    }

    fn sample_artifact(records: Vec<LightcurveRecord>) -> EnsembleArtifact {
        EnsembleArtifact {
            header: ArtifactHeader {
                name: Some("NGC 419".into()),
                location: None,
                radius_deg: 0.08,
                log_age: 9.1,
                has_data: true,
                n_obs_available: 4,
                n_good_obs: records.len() as u32,
                n_failed_download: 1,
                n_near_edge: 0,
                n_scattered_light: 1,
            },
            lightcurves: records,
        }
    }

    #[test]
    fn test_round_trip_preserves_header_and_records() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = Utf8PathBuf::from_path_buf(tmp.path().to_owned()).unwrap();
        let artifact = sample_artifact(vec![sample_record(0), sample_record(2)]);

        let path = EnsembleArtifact::path_for(&dir, "NGC 419");
        artifact.write(&path).unwrap();

        let back = EnsembleArtifact::read(&path).unwrap();
        assert_eq!(back, artifact);
        // candidate order preserved
        assert_eq!(back.lightcurves[0].sector, 0);
        assert_eq!(back.lightcurves[1].sector, 2);
    }

    #[test]
    fn test_reload_is_lazy_and_keeps_identifier_fallback() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = Utf8PathBuf::from_path_buf(tmp.path().to_owned()).unwrap();

        let mut artifact = sample_artifact(vec![sample_record(1), sample_record(3)]);
        artifact.header.name = None;
        artifact.header.location = Some("23:08:48 -72:53:02".into());
        let path = EnsembleArtifact::path_for(&dir, "23:08:48 -72:53:02");
        artifact.write(&path).unwrap();

        let reloaded = ReloadedEnsemble::read(&path).unwrap();
        assert_eq!(reloaded.identifier, "23:08:48 -72:53:02");
        assert_eq!(reloaded.header, artifact.header);
        assert_eq!(reloaded.lightcurves.len(), 2);

        // handles materialize on demand, in order
        let table = reloaded.lightcurves[1].table().unwrap();
        assert_eq!(table, artifact.lightcurves[1]);
    }

    #[test]
    fn test_round_trip_is_bit_exact() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = Utf8PathBuf::from_path_buf(tmp.path().to_owned()).unwrap();

        // fluxes with no short decimal form; the reload must reproduce the
        // exact bit patterns, not a nearest-neighbour ULP
        let mut record = sample_record(0);
        record.series.flux = vec![1000.0 + 1.0_f64.sin(), 1000.0 + 2.0_f64.sin(), 99.0];
        record.series.time = vec![0.1, 0.2, 0.30000000000000004];
        let artifact = sample_artifact(vec![record]);

        let path = EnsembleArtifact::path_for(&dir, "NGC 419");
        artifact.write(&path).unwrap();
        let back = EnsembleArtifact::read(&path).unwrap();

        for (a, b) in artifact.lightcurves[0]
            .series
            .flux
            .iter()
            .zip(&back.lightcurves[0].series.flux)
        {
            assert_eq!(a.to_bits(), b.to_bits());
        }
        for (a, b) in artifact.lightcurves[0]
            .series
            .time
            .iter()
            .zip(&back.lightcurves[0].series.time)
        {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn test_read_missing_artifact() {
        let err = EnsembleArtifact::read(Utf8Path::new("/nonexistent/out.json"));
        assert!(matches!(err, Err(EnsembleError::ArtifactNotFound(_))));
    }

    #[test]
    fn test_access_missing_artifact_warns_and_returns_none() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = Utf8PathBuf::from_path_buf(tmp.path().to_owned()).unwrap();
        let got = access_lightcurve(&dir, None, "unknown", 1).unwrap();
        assert!(got.is_none());
    }

    #[test]
    fn test_access_single_good_obs_is_direct() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = Utf8PathBuf::from_path_buf(tmp.path().to_owned()).unwrap();
        let artifact = sample_artifact(vec![sample_record(2)]);
        artifact
            .write(&EnsembleArtifact::path_for(&dir, "NGC 419"))
            .unwrap();

        // the single record comes back whatever index is asked for
        let got = access_lightcurve(&dir, None, "NGC 419", 1).unwrap().unwrap();
        assert_eq!(got.sector, 2);
        let got = access_lightcurve(&dir, None, "NGC 419", 3).unwrap().unwrap();
        assert_eq!(got.sector, 2);
    }

    #[test]
    fn test_access_multiple_good_obs_by_offset() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = Utf8PathBuf::from_path_buf(tmp.path().to_owned()).unwrap();
        let artifact = sample_artifact(vec![sample_record(0), sample_record(2), sample_record(3)]);
        artifact
            .write(&EnsembleArtifact::path_for(&dir, "NGC 419"))
            .unwrap();

        let got = access_lightcurve(&dir, None, "NGC 419", 2).unwrap().unwrap();
        assert_eq!(got.sector, 2);
        // out of range degrades to None, not an error; 0 is out of range for
        // a 1-based index, not an alias for the first record
        assert!(access_lightcurve(&dir, None, "NGC 419", 9).unwrap().is_none());
        assert!(access_lightcurve(&dir, None, "NGC 419", 0).unwrap().is_none());
    }
}
