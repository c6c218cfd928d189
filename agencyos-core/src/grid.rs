//! Pagination of a campaign's posts into 3x3 grid pages.

pub const PAGE_SIZE: usize = 9;
pub const ROW_SIZE: usize = 3;

/// One page of the grid report.
#[derive(Debug, Clone, PartialEq)]
pub struct GridPage<T> {
    /// 1-based page number.
    pub number: usize,
    pub title: String,
    /// Page items in chronological order.
    pub items: Vec<T>,
    /// Page items newest first, as laid out on the 3x3 grid.
    pub full_grid: Vec<T>,
    /// Rows of up to three, each in chronological order, newest row first.
    pub rows: Vec<Vec<T>>,
}

/// Title of page `number`: the bare campaign title for page 1, `"{title} - Pág NN"` after.
pub fn page_title(title: &str, number: usize) -> String {
    if number <= 1 {
        title.to_string()
    } else {
        format!("{title} - Pág {number:02}")
    }
}

/// Splits chronologically ordered `items` into pages of [`PAGE_SIZE`].
///
/// For `[p1..p9]` the page's `full_grid` is `[p9..p1]` and its rows are
/// `[p7,p8,p9]`, `[p4,p5,p6]`, `[p1,p2,p3]`.
pub fn paginate<T: Clone>(items: &[T], title: &str) -> Vec<GridPage<T>> {
    items
        .chunks(PAGE_SIZE)
        .enumerate()
        .map(|(index, chunk)| {
            let full_grid: Vec<T> = chunk.iter().rev().cloned().collect();
            let rows = full_grid
                .chunks(ROW_SIZE)
                .map(|row| row.iter().rev().cloned().collect())
                .collect();
            GridPage {
                number: index + 1,
                title: page_title(title, index + 1),
                items: chunk.to_vec(),
                full_grid,
                rows,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn posts(n: u32) -> Vec<u32> {
        (1..=n).collect()
    }

    #[test]
    fn no_posts_no_pages() {
        assert!(paginate::<u32>(&[], "Março").is_empty());
    }

    #[test]
    fn nine_posts_fill_one_page() {
        let pages = paginate(&posts(9), "Março");
        assert_eq!(pages.len(), 1);
        let page = &pages[0];
        assert_eq!(page.title, "Março");
        assert_eq!(page.full_grid, vec![9, 8, 7, 6, 5, 4, 3, 2, 1]);
        assert_eq!(page.rows, vec![vec![7, 8, 9], vec![4, 5, 6], vec![1, 2, 3]]);
    }

    #[test]
    fn ten_posts_spill_to_second_page() {
        let pages = paginate(&posts(10), "Março");
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].items.len(), 9);
        assert_eq!(pages[0].title, "Março");
        assert_eq!(pages[1].items, vec![10]);
        assert_eq!(pages[1].title, "Março - Pág 02");
        assert_eq!(pages[1].rows, vec![vec![10]]);
    }

    #[test]
    fn short_page_keeps_partial_row_last() {
        let pages = paginate(&posts(4), "Abril");
        assert_eq!(pages[0].full_grid, vec![4, 3, 2, 1]);
        assert_eq!(pages[0].rows, vec![vec![2, 3, 4], vec![1]]);
    }

    #[test]
    fn titles_are_zero_padded() {
        assert_eq!(page_title("X", 1), "X");
        assert_eq!(page_title("X", 12), "X - Pág 12");
    }
}
