//! Output format and query mode selection.

use serde::Serialize;

use crate::protocol::Protocol;
use crate::records::ProductKind;

/// One output variant of a catalog row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormatVariant {
    pub mime: String,
    pub product: ProductKind,
}

impl FormatVariant {
    pub fn archival(mime: impl Into<String>) -> Self {
        Self {
            mime: mime.into(),
            product: ProductKind::Archival,
        }
    }

    pub fn virtual_product(mime: impl Into<String>) -> Self {
        Self {
            mime: mime.into(),
            product: ProductKind::Virtual,
        }
    }
}

/// Output formats a client accepts, from the FORMAT parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatSelection {
    pub fits: bool,
    pub graphics: bool,
}

impl FormatSelection {
    /// Absent FORMAT means FITS only; "all" means FITS and graphics.
    /// Anything else is matched by substring.
    pub fn from_param(value: Option<&str>) -> Self {
        let Some(value) = value else {
            return Self {
                fits: true,
                graphics: false,
            };
        };
        let value = value.to_ascii_lowercase();
        if value.trim() == "all" {
            return Self {
                fits: true,
                graphics: true,
            };
        }
        Self {
            fits: value.contains("fits"),
            graphics: ["graphic", "gif", "jpeg", "jpg", "png"]
                .iter()
                .any(|g| value.contains(g)),
        }
    }
}

/// Product kinds a client asks for, from the MODE parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeSelection {
    pub archival: bool,
    pub virtual_products: bool,
}

impl ModeSelection {
    /// Absent MODE gives archival records only. "cutout" or "match" adds
    /// virtual records. A MODE naming neither archival nor a cutout mode
    /// suppresses archival records.
    pub fn from_param(value: Option<&str>) -> Self {
        let Some(value) = value else {
            return Self {
                archival: true,
                virtual_products: false,
            };
        };
        let value = value.to_ascii_lowercase();
        let virtual_products = value.contains("cutout") || value.contains("match");
        Self {
            archival: virtual_products || value.contains("archival"),
            virtual_products,
        }
    }
}

/// Graphic MIME type of a stored format string, if it names one.
pub fn graphic_mime(format: &str) -> Option<&'static str> {
    let format = format.to_ascii_lowercase();
    if format.contains("gif") {
        Some("image/gif")
    } else if format.contains("jpeg") || format.contains("jpg") {
        Some("image/jpeg")
    } else if format.contains("png") {
        Some("image/png")
    } else {
        None
    }
}

/// Variants to emit for a row whose stored format is `stored_format`.
///
/// Archival FITS comes first, then its virtual counterpart, then any
/// graphic. Cone search rows always yield exactly one record.
pub fn variants_for(
    protocol: Protocol,
    formats: FormatSelection,
    modes: ModeSelection,
    stored_format: &str,
) -> Vec<FormatVariant> {
    if protocol == Protocol::Cone {
        return vec![FormatVariant::archival(protocol.archival_mime())];
    }

    let stored = stored_format.to_ascii_lowercase();
    let mut variants = Vec::new();

    if formats.fits && stored.contains("fits") {
        if modes.archival {
            variants.push(FormatVariant::archival(protocol.archival_mime()));
        }
        if modes.virtual_products {
            variants.push(FormatVariant::virtual_product(protocol.archival_mime()));
        }
    }
    if formats.graphics {
        if let Some(mime) = graphic_mime(&stored) {
            variants.push(FormatVariant::archival(mime));
        }
    }
    variants
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_selection() {
        assert_eq!(
            FormatSelection::from_param(None),
            FormatSelection {
                fits: true,
                graphics: false
            }
        );
        assert_eq!(
            FormatSelection::from_param(Some("ALL")),
            FormatSelection {
                fits: true,
                graphics: true
            }
        );
        let jpeg = FormatSelection::from_param(Some("image/jpeg"));
        assert!(!jpeg.fits);
        assert!(jpeg.graphics);
    }

    #[test]
    fn test_mode_selection() {
        assert!(ModeSelection::from_param(None).archival);
        let cutout = ModeSelection::from_param(Some("cutout"));
        assert!(cutout.archival && cutout.virtual_products);
        let other = ModeSelection::from_param(Some("mosaic"));
        assert!(!other.archival && !other.virtual_products);
    }

    #[test]
    fn test_variants_for_fits_and_graphic() {
        let v = variants_for(
            Protocol::Image,
            FormatSelection::from_param(Some("all")),
            ModeSelection::from_param(Some("cutout")),
            "image/fits",
        );
        assert_eq!(
            v,
            vec![
                FormatVariant::archival("image/fits"),
                FormatVariant::virtual_product("image/fits"),
            ]
        );

        let g = variants_for(
            Protocol::Image,
            FormatSelection::from_param(Some("all")),
            ModeSelection::from_param(None),
            "image/png",
        );
        assert_eq!(g, vec![FormatVariant::archival("image/png")]);
    }

    #[test]
    fn test_spectrum_mime() {
        let v = variants_for(
            Protocol::Spectrum,
            FormatSelection::from_param(None),
            ModeSelection::from_param(None),
            "application/fits",
        );
        assert_eq!(v, vec![FormatVariant::archival("application/fits")]);
    }
}
