use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek, Write};
use std::path::Path;

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{Result, VersoError};

pub const DOCUMENT_PART: &str = "word/document.xml";

/// Every entry of a docx archive, kept in order so unchanged parts are copied verbatim
pub struct DocxPackage {
    pub entries: Vec<DocxEntry>,
}

pub struct DocxEntry {
    pub name: String,
    pub data: Vec<u8>,
    pub compression: CompressionMethod,
    pub last_modified: zip::DateTime,
    pub unix_mode: Option<u32>,
    pub is_dir: bool,
}

impl DocxPackage {
    pub fn read(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read + Seek>(reader: R) -> Result<Self> {
        let mut zip = ZipArchive::new(reader)?;
        let mut entries = Vec::with_capacity(zip.len());
        for i in 0..zip.len() {
            let mut file = zip.by_index(i)?;
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data)?;
            entries.push(DocxEntry {
                name: file.name().to_string(),
                data,
                compression: file.compression(),
                last_modified: file.last_modified().unwrap_or_default(),
                unix_mode: file.unix_mode(),
                is_dir: file.is_dir(),
            });
        }
        Ok(Self { entries })
    }

    /// New package from named parts, deflated
    pub fn from_parts(parts: Vec<(&str, Vec<u8>)>) -> Self {
        let entries = parts
            .into_iter()
            .map(|(name, data)| DocxEntry {
                name: name.to_string(),
                data,
                compression: CompressionMethod::Deflated,
                last_modified: zip::DateTime::default(),
                unix_mode: None,
                is_dir: false,
            })
            .collect();
        Self { entries }
    }

    pub fn part(&self, name: &str) -> Result<&[u8]> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.data.as_slice())
            .ok_or_else(|| VersoError::Document(format!("missing part {} in docx package", name)))
    }

    /// Write the archive to `output_path`, swapping in replaced parts
    ///
    /// The archive is assembled in a temporary file next to the output and renamed
    /// into place, so a failed save never leaves a truncated document behind.
    pub fn write_with_replacements(
        &self,
        output_path: &Path,
        replacements: &HashMap<String, Vec<u8>>,
    ) -> Result<()> {
        let dir = match output_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => std::env::current_dir()?,
        };
        let mut temp = tempfile::NamedTempFile::new_in(&dir)?;

        {
            let mut zout = ZipWriter::new(temp.as_file_mut());
            for ent in &self.entries {
                let data = replacements.get(&ent.name).unwrap_or(&ent.data);
                let mut opts = SimpleFileOptions::default()
                    .compression_method(ent.compression)
                    .last_modified_time(ent.last_modified);
                if let Some(mode) = ent.unix_mode {
                    opts = opts.unix_permissions(mode);
                }
                if ent.is_dir || ent.name.ends_with('/') {
                    zout.add_directory(ent.name.as_str(), opts)?;
                } else {
                    zout.start_file(ent.name.as_str(), opts)?;
                    zout.write_all(data)?;
                }
            }
            zout.finish()?;
        }

        temp.persist(output_path)
            .map_err(|e| VersoError::Document(format!("Failed to write {}: {}", output_path.display(), e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pkg.docx");

        let package = DocxPackage::from_parts(vec![
            ("[Content_Types].xml", b"<Types/>".to_vec()),
            (DOCUMENT_PART, b"<w:document/>".to_vec()),
        ]);

        let mut replacements = HashMap::new();
        replacements.insert(DOCUMENT_PART.to_string(), b"<w:document>x</w:document>".to_vec());
        package.write_with_replacements(&path, &replacements).unwrap();

        let reread = DocxPackage::read(&path).unwrap();
        assert_eq!(reread.entries.len(), 2);
        assert_eq!(reread.part("[Content_Types].xml").unwrap(), b"<Types/>");
        assert_eq!(reread.part(DOCUMENT_PART).unwrap(), b"<w:document>x</w:document>");
        assert!(reread.part("word/styles.xml").is_err());
    }
}
