//! Parsing helpers for `/proc/mtd`.

/// One MTD partition as listed by the kernel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MtdPartition {
    pub index: u32,
    pub size: u64,
    pub erase_size: u32,
    pub name: String,
}

/// Parses `/proc/mtd`:
///
/// ```text
/// dev:    size   erasesize  name
/// mtd0: 00040000 00020000 "misc"
/// ```
///
/// Lines that do not match are skipped.
pub fn parse_proc_mtd(content: &str) -> Vec<MtdPartition> {
    content
        .lines()
        .filter_map(|line| {
            let (dev, rest) = line.split_once(':')?;
            let index = dev.trim().strip_prefix("mtd")?.parse().ok()?;
            let mut fields = rest.split_whitespace();
            let size = u64::from_str_radix(fields.next()?, 16).ok()?;
            let erase_size = u32::from_str_radix(fields.next()?, 16).ok()?;
            let name = rest
                .split_once('"')
                .and_then(|(_, tail)| tail.rsplit_once('"'))
                .map(|(name, _)| name.to_string())?;
            Some(MtdPartition {
                index,
                size,
                erase_size,
                name,
            })
        })
        .collect()
}

pub fn find_by_name<'a>(name: &str, partitions: &'a [MtdPartition]) -> Option<&'a MtdPartition> {
    partitions.iter().find(|p| p.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "dev:    size   erasesize  name\n\
                          mtd0: 00040000 00020000 \"misc\"\n\
                          mtd1: 00500000 00020000 \"recovery\"\n\
                          mtd2: 00280000 00020000 \"boot\"\n\
                          mtd3: 0fa00000 00020000 \"system data\"\n";

    #[test]
    fn parse_proc_mtd_reads_all_partitions() {
        let parts = parse_proc_mtd(SAMPLE);
        assert_eq!(parts.len(), 4);
        assert_eq!(
            parts[2],
            MtdPartition {
                index: 2,
                size: 0x0028_0000,
                erase_size: 0x0002_0000,
                name: "boot".to_string(),
            }
        );
    }

    #[test]
    fn parse_proc_mtd_keeps_spaces_in_names() {
        let parts = parse_proc_mtd(SAMPLE);
        assert_eq!(parts[3].name, "system data");
    }

    #[test]
    fn find_by_name_is_exact() {
        let parts = parse_proc_mtd(SAMPLE);
        assert_eq!(find_by_name("boot", &parts).map(|p| p.index), Some(2));
        assert!(find_by_name("Boot", &parts).is_none());
    }
}
