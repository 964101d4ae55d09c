//! JSON state file holding the user's bottles.

use eyre::WrapErr;
use pillbox_core::{PillBottle, PillError};
use serde::{Deserialize, Serialize};
use std::{fs, io::Write, path::Path};
use uuid::Uuid;

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Shelf {
    pub bottles: Vec<PillBottle>,
}

/// Replace `path` with `bytes` via a synced sibling file and a rename, so a
/// crash leaves either the old or the new state on disk.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension("new");
    {
        let mut f = fs::File::create(&tmp)?;
        f.write_all(bytes)?;
        f.sync_all()?;
    }
    fs::rename(tmp, path)
}

impl Shelf {
    /// Reads `path`; a missing file is an empty shelf. Every bottle is
    /// checked as if it had just been built.
    pub fn load(path: &Path) -> eyre::Result<Self> {
        match fs::read_to_string(path) {
            Ok(text) => {
                let shelf: Self = serde_json::from_str(&text)
                    .wrap_err_with(|| format!("parse state file {}", path.display()))?;
                for b in &shelf.bottles {
                    b.validate().wrap_err_with(|| {
                        format!("bottle {} in state file {}", b.id, path.display())
                    })?;
                }
                Ok(shelf)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no state file yet");
                Ok(Self::default())
            }
            Err(e) => Err(e).wrap_err_with(|| format!("read state file {}", path.display())),
        }
    }

    pub fn save(&self, path: &Path) -> eyre::Result<()> {
        let bytes = serde_json::to_vec_pretty(self).wrap_err("serialize state")?;
        write_atomic(path, &bytes)
            .wrap_err_with(|| format!("write state file {}", path.display()))?;
        tracing::debug!(path = %path.display(), bottles = self.bottles.len(), "state saved");
        Ok(())
    }

    /// The bottle with `id`, or the only bottle when no id is given.
    pub fn select_mut(&mut self, id: Option<Uuid>) -> Result<&mut PillBottle, PillError> {
        match id {
            Some(id) => self
                .bottles
                .iter_mut()
                .find(|b| b.id == id)
                .ok_or_else(|| PillError::State(format!("no bottle with id {id}"))),
            None => match self.bottles.as_mut_slice() {
                [] => Err(PillError::State(
                    "state file holds no bottles; run new-bottle first".into(),
                )),
                [only] => Ok(only),
                many => Err(PillError::State(format!(
                    "state file holds {} bottles; pass --bottle <id>",
                    many.len()
                ))),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};
    use pillbox_core::{DoseSchedule, Frequency, Pill};
    use rstest::rstest;
    use tempfile::tempdir;

    fn bottle(name: &str) -> PillBottle {
        let at = NaiveDate::from_ymd_opt(2025, 1, 6)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        let pill = Pill::new(name, 0.4, at).unwrap();
        let s = DoseSchedule::new(1, Frequency::OnceDaily, NaiveTime::from_hms_opt(8, 0, 0).unwrap())
            .unwrap();
        PillBottle::new(pill, 30, s, at).unwrap()
    }

    #[test]
    fn missing_file_is_empty_shelf() {
        let dir = tempdir().unwrap();
        let shelf = Shelf::load(&dir.path().join("nope.json")).unwrap();
        assert!(shelf.bottles.is_empty());
    }

    #[test]
    fn save_then_load_keeps_bottles_and_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        let shelf = Shelf {
            bottles: vec![bottle("Ibuprofen")],
        };
        shelf.save(&path).unwrap();
        assert!(!path.with_extension("new").exists());
        let back = Shelf::load(&path).unwrap();
        assert_eq!(back.bottles, shelf.bottles);
    }

    #[test]
    fn corrupt_state_names_the_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{ not json").unwrap();
        let err = Shelf::load(&path).unwrap_err();
        assert!(format!("{err}").contains("state.json"), "{err}");
    }

    #[rstest]
    #[case::overfull(|b: &mut PillBottle| b.remaining_pill_count = b.initial_pill_count + 1, 6)]
    #[case::zero_dosage(|b: &mut PillBottle| b.schedule.dosage_amount = 0, 6)]
    #[case::bad_unit_weight(|b: &mut PillBottle| b.pill.unit_weight_g = -0.4, 5)]
    fn hand_edited_bottle_is_rejected_on_load(
        #[case] edit: fn(&mut PillBottle),
        #[case] code: i32,
    ) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        let mut b = bottle("Ibuprofen");
        edit(&mut b);
        let id = b.id;
        Shelf { bottles: vec![b] }.save(&path).unwrap();

        let err = Shelf::load(&path).unwrap_err();
        let msg = format!("{err}");
        assert!(msg.contains(&id.to_string()) && msg.contains("state.json"), "{msg}");
        assert_eq!(crate::error_fmt::exit_code_for_error(&err), code);
    }

    #[test]
    fn selection_rules() {
        let mut shelf = Shelf::default();
        assert!(matches!(shelf.select_mut(None), Err(PillError::State(_))));

        shelf.bottles.push(bottle("A"));
        let first = shelf.bottles[0].id;
        assert_eq!(shelf.select_mut(None).unwrap().id, first);

        shelf.bottles.push(bottle("B"));
        let second = shelf.bottles[1].id;
        assert!(shelf.select_mut(None).is_err());
        assert_eq!(shelf.select_mut(Some(second)).unwrap().pill.name, "B");
        assert!(shelf.select_mut(Some(Uuid::new_v4())).is_err());
    }
}
