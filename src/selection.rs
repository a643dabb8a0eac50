use crate::filter::QueryKey;
use crate::models::{Idea, IdeaId};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolved<'a> {
    Nothing,
    Found(&'a Idea),
    /// The selected id is no longer in the list. It is kept until deselected.
    Missing(IdeaId),
}

/// Tracks the single inspected idea by id.
#[derive(Debug)]
pub struct SelectionController {
    selected: Option<IdeaId>,
    list_was_empty: bool,
    seen: Option<(QueryKey, u64)>,
}

impl Default for SelectionController {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionController {
    pub fn new() -> Self {
        Self {
            selected: None,
            list_was_empty: true,
            seen: None,
        }
    }

    pub fn selected_id(&self) -> Option<IdeaId> {
        self.selected
    }

    pub fn select(&mut self, id: IdeaId) {
        self.selected = Some(id);
    }

    pub fn deselect(&mut self) {
        self.selected = None;
    }

    /// Call with the server-filtered list (not the search-narrowed one) each time it
    /// is refreshed. Picks the first item on an empty to non-empty transition when
    /// nothing is selected; never replaces an existing selection.
    pub fn on_list_refresh(&mut self, ideas: &[Idea]) {
        if self.list_was_empty && self.selected.is_none() {
            if let Some(first) = ideas.first() {
                self.selected = Some(first.id);
            }
        }
        self.list_was_empty = ideas.is_empty();
    }

    /// Runs `on_list_refresh` once per settled version of `key`. Versions restart
    /// for every cache key, so the key is part of what was seen.
    pub fn observe(&mut self, key: QueryKey, version: u64, ideas: &[Idea]) -> bool {
        if self.seen == Some((key, version)) {
            return false;
        }
        self.seen = Some((key, version));
        self.on_list_refresh(ideas);
        true
    }

    /// Looks the selected id up in `ideas`. Never holds on to a previous object.
    pub fn resolve<'a>(&self, ideas: &'a [Idea]) -> Resolved<'a> {
        match self.selected {
            None => Resolved::Nothing,
            Some(id) => ideas
                .iter()
                .find(|idea| idea.id == id)
                .map(Resolved::Found)
                .unwrap_or(Resolved::Missing(id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_api::idea;
    use crate::filter::ActiveFilter;

    const ALL: QueryKey = QueryKey::Ideas(ActiveFilter::All);
    const FAVORITES: QueryKey = QueryKey::Ideas(ActiveFilter::Favorites);

    #[test]
    fn auto_selects_first_on_first_data() {
        let mut selection = SelectionController::new();
        selection.on_list_refresh(&[]);
        assert_eq!(selection.selected_id(), None);

        selection.on_list_refresh(&[idea(4, "Alpha", 80.0), idea(2, "Beta", 40.0)]);
        assert_eq!(selection.selected_id(), Some(4));
    }

    #[test]
    fn keeps_existing_selection_across_refreshes() {
        let mut selection = SelectionController::new();
        selection.on_list_refresh(&[idea(1, "Alpha", 80.0), idea(2, "Beta", 40.0)]);
        selection.select(2);

        selection.on_list_refresh(&[idea(3, "Gamma", 60.0), idea(2, "Beta", 45.0)]);
        assert_eq!(selection.selected_id(), Some(2));
    }

    #[test]
    fn auto_select_happens_once_per_transition() {
        let mut selection = SelectionController::new();
        selection.on_list_refresh(&[idea(1, "Alpha", 80.0)]);
        selection.deselect();

        selection.on_list_refresh(&[idea(1, "Alpha", 80.0), idea(2, "Beta", 40.0)]);
        assert_eq!(selection.selected_id(), None);

        selection.on_list_refresh(&[]);
        selection.on_list_refresh(&[idea(2, "Beta", 40.0)]);
        assert_eq!(selection.selected_id(), Some(2));
    }

    #[test]
    fn resolves_by_id_against_the_fresh_list() {
        let mut selection = SelectionController::new();
        selection.select(2);

        let before = [idea(2, "Beta", 40.0)];
        let after = [idea(2, "Beta Renamed", 55.0)];
        match selection.resolve(&before) {
            Resolved::Found(found) => assert_eq!(found.product_name, "Beta"),
            other => panic!("unexpected {other:?}"),
        }
        match selection.resolve(&after) {
            Resolved::Found(found) => assert_eq!(found.product_name, "Beta Renamed"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn vanished_id_is_kept_as_missing() {
        let mut selection = SelectionController::new();
        selection.on_list_refresh(&[idea(9, "Alpha", 80.0)]);
        selection.on_list_refresh(&[idea(3, "Gamma", 60.0)]);

        assert_eq!(selection.selected_id(), Some(9));
        assert_eq!(selection.resolve(&[idea(3, "Gamma", 60.0)]), Resolved::Missing(9));
    }

    #[test]
    fn observe_skips_already_seen_versions() {
        let mut selection = SelectionController::new();
        let ideas = [idea(5, "Alpha", 80.0)];
        assert!(selection.observe(ALL, 1, &ideas));
        assert!(!selection.observe(ALL, 1, &ideas));
        assert_eq!(selection.selected_id(), Some(5));
    }

    #[test]
    fn same_version_under_a_new_key_is_a_fresh_refresh() {
        let mut selection = SelectionController::new();
        assert!(selection.observe(FAVORITES, 1, &[]));
        assert_eq!(selection.selected_id(), None);

        let ideas = [idea(8, "Alpha", 80.0), idea(2, "Beta", 40.0)];
        assert!(selection.observe(ALL, 1, &ideas));
        assert_eq!(selection.selected_id(), Some(8));
    }
}
