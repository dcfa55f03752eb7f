use crate::coordination::Rgb;
use crate::scoring::CellPartition;

/// Members of the anchor of interest falling in one partition class, for
/// drawing a per-class contour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContourGroup {
    /// Class label.
    pub name: String,
    /// Member rows in this class.
    pub indices: Vec<usize>,
    /// Class color.
    pub color: Rgb,
    /// Whether the group has any member.
    pub visible: bool,
}

/// One group per class of `partition`. With no `members` (nothing focused)
/// every group is empty and hidden.
#[must_use]
pub fn contour_groups(
    members: Option<&[usize]>,
    partition: &CellPartition,
) -> Vec<ContourGroup> {
    partition
        .classes()
        .iter()
        .map(|class| {
            let indices: Vec<usize> = members
                .unwrap_or_default()
                .iter()
                .copied()
                .filter(|&i| partition.label(i) == Some(class.name.as_str()))
                .collect();
            ContourGroup {
                name: class.name.clone(),
                visible: !indices.is_empty(),
                indices,
                color: class.color,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn partition() -> CellPartition {
        CellPartition::new(
            "Cell Type",
            ["T", "B", "T", "NK"].map(String::from).to_vec(),
            &[],
            [60, 60, 60],
        )
    }

    #[test]
    fn focused_members_split_by_class() {
        let groups = contour_groups(Some(&[0, 2, 3][..]), &partition());
        assert_eq!(groups.len(), 3);
        let names: Vec<_> = groups.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, ["B", "NK", "T"]);
        assert!(!groups[0].visible);
        assert_eq!(groups[1].indices, [3]);
        assert_eq!(groups[2].indices, [0, 2]);
        assert!(groups[2].visible);
    }

    #[test]
    fn nothing_focused_lists_hidden_groups() {
        let groups = contour_groups(None, &partition());
        assert_eq!(groups.len(), 3);
        assert!(groups.iter().all(|g| g.indices.is_empty() && !g.visible));
        assert_eq!(groups[1].color, [60, 60, 60]);
    }
}
