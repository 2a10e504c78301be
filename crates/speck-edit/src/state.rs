use speck_render::EditParts;

/// Edit state of a single splat, derived from its bits and the cutouts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SplatState {
    Normal,
    Selected,
    Deleted,
    Cut,
}

impl SplatState {
    /// Deleted wins over cut, both win over selected.
    pub fn from_flags(selected: bool, deleted: bool, cut: bool) -> Self {
        if deleted {
            Self::Deleted
        } else if cut {
            Self::Cut
        } else if selected {
            Self::Selected
        } else {
            Self::Normal
        }
    }

    pub fn of(parts: &EditParts<'_>, index: usize) -> Self {
        let deleted = parts.deletion.get(index);
        let cut = !deleted && parts.cutouts.is_cut(parts.storage.position(index));
        Self::from_flags(parts.selection.get(index), deleted, cut)
    }

    /// Neither deleted nor cut, so it can be selected and edited.
    pub fn is_editable(self) -> bool {
        matches!(self, Self::Normal | Self::Selected)
    }
}
