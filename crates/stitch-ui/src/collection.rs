use stitch_engine::host::PixelImage;

/// An image in the collection plus its selection state.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectableImage {
    image: PixelImage,
    selected: bool,
}

impl SelectableImage {
    pub fn new(image: PixelImage, selected: bool) -> Self {
        Self { image, selected }
    }

    #[inline]
    pub fn image(&self) -> &PixelImage {
        &self.image
    }

    #[inline]
    pub fn is_selected(&self) -> bool {
        self.selected
    }

    pub fn set_selected(&mut self, selected: bool) {
        self.selected = selected;
    }

    /// Flips the selection and returns the new state.
    pub fn toggle(&mut self) -> bool {
        self.selected = !self.selected;
        self.selected
    }
}

/// Ordered list of inputs and stitched results.
///
/// Inputs arrive selected so that adding two images and stitching needs no
/// extra clicks; results arrive unselected.
#[derive(Debug, Clone, Default)]
pub struct ImageCollection {
    items: Vec<SelectableImage>,
}

impl ImageCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_input(&mut self, image: PixelImage) -> usize {
        self.push(SelectableImage::new(image, true))
    }

    pub fn add_result(&mut self, image: PixelImage) -> usize {
        self.push(SelectableImage::new(image, false))
    }

    fn push(&mut self, item: SelectableImage) -> usize {
        self.items.push(item);
        self.items.len() - 1
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&SelectableImage> {
        self.items.get(index)
    }

    pub fn toggle(&mut self, index: usize) -> Option<bool> {
        self.items.get_mut(index).map(SelectableImage::toggle)
    }

    /// Returns `false` when `index` is out of range.
    pub fn set_selected(&mut self, index: usize, selected: bool) -> bool {
        match self.items.get_mut(index) {
            Some(item) => {
                item.set_selected(selected);
                true
            }
            None => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &SelectableImage> {
        self.items.iter()
    }

    pub fn selected(&self) -> impl Iterator<Item = &PixelImage> {
        self.items.iter().filter(|i| i.selected).map(|i| &i.image)
    }

    pub fn selected_count(&self) -> usize {
        self.items.iter().filter(|i| i.selected).count()
    }

    /// Copies of the selected images, in collection order, if exactly two are selected.
    pub fn selected_pair(&self) -> Option<[PixelImage; 2]> {
        let mut sel = self.selected();
        match (sel.next(), sel.next(), sel.next()) {
            (Some(a), Some(b), None) => Some([a.clone(), b.clone()]),
            _ => None,
        }
    }
}
