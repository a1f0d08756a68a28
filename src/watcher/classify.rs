//! Change classification.
//!
//! Pure function from one scan round's observations to at most one HMR
//! event. Anything the client cannot patch in place — config reloads,
//! multi-app rounds, shell edits, deletions — collapses to a full reload.

use rustc_hash::FxHashSet;

use crate::config::AppEntry;
use crate::hmr::HmrEvent;

/// What one scan round observed.
#[derive(Debug, Default)]
pub struct RoundChanges {
    pub config_changed: bool,
    pub shell_changed: bool,
    pub deletions: bool,
    /// Indices into the live app list, deduplicated.
    pub changed_apps: FxHashSet<usize>,
    /// Extensions of changed files.
    pub changed_exts: FxHashSet<String>,
}

impl RoundChanges {
    pub fn any(&self) -> bool {
        self.config_changed || self.shell_changed || self.deletions || !self.changed_apps.is_empty()
    }
}

/// Classify a round. `None` when nothing happened.
pub fn classify(changes: &RoundChanges, apps: &[AppEntry]) -> Option<HmrEvent> {
    if !changes.any() {
        return None;
    }

    if changes.config_changed
        || changes.shell_changed
        || changes.deletions
        || changes.changed_apps.len() >= 2
    {
        return Some(HmrEvent::FullReload);
    }

    let idx = *changes.changed_apps.iter().next()?;
    let app = apps.get(idx)?;

    let css_only =
        changes.changed_exts.len() == 1 && changes.changed_exts.contains(".css");
    if css_only {
        return Some(HmrEvent::CssUpdate {
            app: app.name.clone(),
        });
    }

    Some(HmrEvent::AppUpdate {
        app: app.name.clone(),
        dir: app.dir.clone(),
        framework: app.framework.clone(),
    })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn apps() -> Vec<AppEntry> {
        vec![
            AppEntry {
                name: "header".into(),
                dir: "mf-header".into(),
                framework: "react".into(),
            },
            AppEntry {
                name: "cart".into(),
                dir: "mf-cart".into(),
                framework: "vue".into(),
            },
        ]
    }

    fn round() -> RoundChanges {
        RoundChanges::default()
    }

    #[test]
    fn test_quiet_round() {
        assert_eq!(classify(&round(), &apps()), None);
    }

    #[test]
    fn test_css_only_single_app() {
        let mut c = round();
        c.changed_apps.insert(0);
        c.changed_exts.insert(".css".into());
        assert_eq!(
            classify(&c, &apps()),
            Some(HmrEvent::CssUpdate {
                app: "header".into()
            })
        );
    }

    #[test]
    fn test_single_app_update() {
        let mut c = round();
        c.changed_apps.insert(1);
        c.changed_exts.insert(".vue".into());
        assert_eq!(
            classify(&c, &apps()),
            Some(HmrEvent::AppUpdate {
                app: "cart".into(),
                dir: "mf-cart".into(),
                framework: "vue".into()
            })
        );
    }

    #[test]
    fn test_css_plus_js_is_app_update() {
        let mut c = round();
        c.changed_apps.insert(0);
        c.changed_exts.insert(".css".into());
        c.changed_exts.insert(".jsx".into());
        assert!(matches!(
            classify(&c, &apps()),
            Some(HmrEvent::AppUpdate { .. })
        ));
    }

    #[test]
    fn test_two_apps_full_reload() {
        let mut c = round();
        c.changed_apps.insert(0);
        c.changed_apps.insert(1);
        c.changed_exts.insert(".css".into());
        assert_eq!(classify(&c, &apps()), Some(HmrEvent::FullReload));
    }

    #[test]
    fn test_escalations() {
        for set in [
            |c: &mut RoundChanges| c.config_changed = true,
            |c: &mut RoundChanges| c.shell_changed = true,
            |c: &mut RoundChanges| c.deletions = true,
        ] {
            let mut c = round();
            set(&mut c);
            assert_eq!(classify(&c, &apps()), Some(HmrEvent::FullReload));
        }
    }
}
