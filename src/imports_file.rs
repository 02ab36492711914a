//! The `.gcda.imports` text codec (`spec.md §6`, "Persisted state").
//!
//! Downstream consumers may emit a per-module `.gcda.imports` text file
//! — one aux-module source filename per line, in import order — that this
//! engine can later read back in lieu of re-running grouping. Module
//! resolution on read is by basename match against the currently loaded
//! module list, exactly as specified.

use std::io::{BufRead, Write};
use std::path::Path;

use crate::error::{Error, Result};
use crate::export::ModuleGroup;
use crate::ids::ModuleId;
use crate::profile::Profile;

/// Write `group`'s auxiliary modules, one source filename per line, in
/// import order (`spec.md §6`: `<source_filename>\n`).
pub fn write(w: &mut impl Write, group: &ModuleGroup) -> std::io::Result<()> {
    for aux in &group.aux {
        writeln!(w, "{}", aux.source_filename)?;
    }
    Ok(())
}

fn basename(path: &str) -> &str {
    Path::new(path).file_name().and_then(|s| s.to_str()).unwrap_or(path)
}

/// Parse a `.gcda.imports` text stream into the ordered list of module
/// ids it names, resolving each line by basename match against `profile`.
/// Blank lines are skipped. A line matching no loaded module is a format
/// error (`Error::ImportsFileFormat`), per the fatal-on-malformed-input
/// policy for persisted state (`spec.md §7`).
pub fn read(r: impl BufRead, profile: &Profile) -> Result<Vec<ModuleId>> {
    let mut ids = Vec::new();
    for line in r.lines() {
        let line = line.map_err(|_| Error::ImportsFileFormat(String::new()))?;
        if line.is_empty() {
            continue;
        }
        let target = basename(&line);
        let found = profile
            .modules()
            .iter()
            .find(|m| basename(&m.source_filename) == target);
        match found {
            Some(m) => ids.push(m.id),
            None => return Err(Error::ImportsFileFormat(line)),
        }
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::AuxModule;
    use crate::ids::FunctionId;
    use crate::profile::{Function, Language, Module, ModuleFlags};

    fn profile_with(filenames: &[(u32, &str)]) -> Profile {
        let modules = filenames
            .iter()
            .map(|&(id, name)| {
                Module::new(
                    ModuleId(id),
                    name,
                    ModuleFlags::empty(),
                    Language::C,
                    10,
                    vec![Function::new(FunctionId(1), 1, 1)],
                )
            })
            .collect();
        Profile::new(modules)
    }

    #[test]
    fn round_trips_aux_list_in_order() {
        let profile = profile_with(&[(1, "a.c"), (2, "b.c"), (3, "c.c")]);
        let group = ModuleGroup {
            primary_module_id: ModuleId(1),
            is_exported: false,
            include_all_aux: false,
            aux: vec![
                AuxModule { module_id: ModuleId(3), source_filename: "c.c".into(), weight: 100.0 },
                AuxModule { module_id: ModuleId(2), source_filename: "b.c".into(), weight: 50.0 },
            ],
        };
        let mut buf = Vec::new();
        write(&mut buf, &group).unwrap();
        assert_eq!(buf, b"c.c\nb.c\n");

        let ids = read(buf.as_slice(), &profile).unwrap();
        assert_eq!(ids, vec![ModuleId(3), ModuleId(2)]);
    }

    #[test]
    fn resolves_by_basename_when_paths_differ() {
        let profile = profile_with(&[(1, "/build/obj/a.c"), (2, "b.c")]);
        let text = "a.c\n";
        let ids = read(text.as_bytes(), &profile).unwrap();
        assert_eq!(ids, vec![ModuleId(1)]);
    }

    #[test]
    fn unresolvable_line_is_a_format_error() {
        let profile = profile_with(&[(1, "a.c")]);
        let text = "missing.c\n";
        let err = read(text.as_bytes(), &profile).unwrap_err();
        assert!(matches!(err, Error::ImportsFileFormat(line) if line == "missing.c"));
    }

    #[test]
    fn blank_lines_are_skipped() {
        let profile = profile_with(&[(1, "a.c")]);
        let text = "a.c\n\n";
        let ids = read(text.as_bytes(), &profile).unwrap();
        assert_eq!(ids, vec![ModuleId(1)]);
    }
}
