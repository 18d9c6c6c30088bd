//! Fixture text shared by the end-to-end scenario tests.

pub const PERSON_WITH_AGE: &str = r#"<schema>
    <element name="Person">
        <complexType>
            <sequence>
                <element name="Name" type="xs:string"/>
                <element name="Age" type="xs:integer"/>
            </sequence>
        </complexType>
    </element>
</schema>"#;

pub const INDIVIDUAL_WITH_NONNEGATIVE_YEARS: &str = r#"<schema>
    <element name="Individual">
        <complexType>
            <attribute name="fullname" type="xs:string"/>
            <attribute name="years">
                <simpleType>
                    <restriction base="xs:integer">
                        <minInclusive value="0"/>
                    </restriction>
                </simpleType>
            </attribute>
        </complexType>
    </element>
</schema>"#;

pub const GUARDED_PERSON_TO_INDIVIDUAL: &str = r#"<stylesheet>
    <template match="Person">
        <if test="Age &gt;= 0">
            <Individual fullname="{Name}" years="{Age}"/>
        </if>
    </template>
</stylesheet>"#;

pub const UNGUARDED_PERSON_TO_INDIVIDUAL: &str = r#"<stylesheet>
    <template match="Person">
        <Individual fullname="{Name}" years="{Age}"/>
    </template>
</stylesheet>"#;
